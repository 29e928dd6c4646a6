//! Board spreadsheets.
//!
//! Two export layouts are supported. The *basic* layout mirrors the board:
//! one row per floor and one column per unit. The *floor-unit* layout
//! writes each unit as a `(floor+unit number, data)` pair under a merged
//! `NN호` header. Basic workbooks can be read back with [`decode`].

mod basic;
mod decode;
mod floor_unit;
mod package;
mod style;

use board::Grid;
use rust_xlsxwriter::{DocProperties, Workbook};
use thiserror::Error;

pub use basic::encode_basic;
pub use decode::decode;
pub use floor_unit::{CellTextSource, encode_floor_unit};

/// Label of the floor column in both layouts.
pub const FLOOR_LABEL: &str = "층";
pub const BASIC_SHEET_NAME: &str = "현황분석";
pub const FLOOR_UNIT_SHEET_NAME: &str = "변환결과";

/// Leading bytes of every zip container, xlsx included.
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("board has no rows")]
    EmptyGrid,
    #[error("file is not an xlsx workbook")]
    NotSpreadsheet,
    #[error("workbook has no worksheets")]
    NoWorksheet,
    #[error("board exceeds worksheet limits ({0})")]
    TooLarge(&'static str),
    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),
    #[error("failed to open workbook archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("malformed workbook part {part}: {reason}")]
    Part { part: String, reason: String },
}

impl SpreadsheetError {
    /// Whether the error stems from what the caller sent rather than from us.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, SpreadsheetError::Write(_) | SpreadsheetError::TooLarge(_))
    }
}

/// Cheap container check done before any expensive parsing or worker call.
pub fn is_spreadsheet_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC)
}

/// Decode a basic-layout workbook and re-encode it in the floor-unit layout,
/// with each unit's data taken from its fill color.
pub fn convert_to_floor_unit(bytes: &[u8]) -> Result<Vec<u8>, SpreadsheetError> {
    let grid = decode(bytes)?;
    tracing::debug!("Decoded workbook with {} floors", grid.data.len());
    encode_floor_unit(&grid, CellTextSource::StatusCode)
}

fn new_workbook(grid: &Grid) -> Result<Workbook, SpreadsheetError> {
    if grid.is_empty() {
        return Err(SpreadsheetError::EmptyGrid);
    }
    let mut workbook = Workbook::new();
    if let Some(header) = grid.display_header() {
        let mut properties = DocProperties::new();
        if let Some(name) = header.name.as_deref().filter(|s| !s.trim().is_empty()) {
            properties = properties.set_title(name);
        }
        if let Some(building) = header.building.as_deref().filter(|s| !s.trim().is_empty()) {
            properties = properties.set_subject(building);
        }
        workbook.set_properties(&properties);
    }
    Ok(workbook)
}

fn row_index(index: usize) -> Result<u32, SpreadsheetError> {
    u32::try_from(index).map_err(|_| SpreadsheetError::TooLarge("rows"))
}

fn col_index(index: usize) -> Result<u16, SpreadsheetError> {
    u16::try_from(index).map_err(|_| SpreadsheetError::TooLarge("columns"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{Cursor, Read};

    use board::{Grid, NormalizedInput, PaletteColor};
    use calamine::{Data, Range, Reader, Xlsx};

    use super::package::CellFills;

    pub fn grid(json: &str) -> Grid {
        serde_json::from_str::<NormalizedInput>(json).unwrap().into()
    }

    pub fn first_sheet(bytes: &[u8]) -> Range<Data> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names().len(), 1);
        workbook.worksheet_range_at(0).unwrap().unwrap()
    }

    pub fn sheet_name(bytes: &[u8]) -> String {
        let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        workbook.sheet_names()[0].clone()
    }

    pub fn text(range: &Range<Data>, row: u32, col: u32) -> String {
        range
            .get_value((row, col))
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn fill(bytes: &[u8], row: u32, col: u32) -> PaletteColor {
        CellFills::read(bytes).unwrap().color_at(row, col)
    }

    pub fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::grid, *};

    #[test]
    fn test_container_magic() {
        assert!(is_spreadsheet_container(b"PK\x03\x04rest"));
        assert!(!is_spreadsheet_container(b"PK\x05\x06"));
        assert!(!is_spreadsheet_container(b"%PDF-1.7"));
        assert!(!is_spreadsheet_container(b"PK"));
    }

    #[test]
    fn test_empty_grid_rejected() {
        let empty = grid(r#"{"data":[]}"#);
        assert!(matches!(encode_basic(&empty), Err(SpreadsheetError::EmptyGrid)));
        assert!(matches!(
            encode_floor_unit(&empty, CellTextSource::CellText),
            Err(SpreadsheetError::EmptyGrid)
        ));
    }

    #[test]
    fn test_convert_rejects_non_container() {
        let err = convert_to_floor_unit(b"not a workbook").unwrap_err();
        assert!(matches!(err, SpreadsheetError::NotSpreadsheet));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_convert_derives_status_from_fill() {
        let source = encode_basic(&grid(
            r#"{"data":[{"floor":"3층","units":{"301":{"text":"x","color":"GREEN"},"302":{"text":"y","color":"YELLOW"},"303":{"text":"z","color":"WHITE"}}}]}"#,
        ))
        .unwrap();
        let converted = convert_to_floor_unit(&source).unwrap();
        let range = testing::first_sheet(&converted);
        assert_eq!(testing::text(&range, 1, 0), "3");
        assert_eq!(testing::text(&range, 1, 1), "301");
        assert_eq!(testing::text(&range, 1, 2), "KT");
        assert_eq!(testing::text(&range, 1, 4), "M");
        assert_eq!(testing::text(&range, 1, 6), "");
    }
}
