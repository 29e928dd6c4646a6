//! Floor/unit status board model.
//!
//! A board is a grid of floors (rows) by units (columns). Every other crate in
//! the workspace (recognition output parsing, spreadsheet export and import,
//! preview rendering) goes through the types here so they agree on column
//! order and color handling.

pub mod grid;
pub mod palette;
pub mod view;

pub use grid::{
    FloorRow, Grid, HeaderInfo, NormalizedInput, UnitCell, ascii_digits, unit_keys, unit_number,
};
pub use palette::PaletteColor;
pub use view::GridView;
