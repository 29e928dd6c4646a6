//! Preview projection of a board, laid out the same way the spreadsheet
//! exports are so the on-screen table and the download agree.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    grid::{Grid, HeaderInfo, unit_keys},
    palette::PaletteColor,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct GridView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderInfo>,
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct RowView {
    pub floor: String,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CellView {
    pub unit: String,
    pub text: String,
    pub color: PaletteColor,
    /// CSS background for the cell
    pub display: String,
}

impl From<&Grid> for GridView {
    fn from(grid: &Grid) -> Self {
        let columns = unit_keys(grid);
        let rows = grid
            .data
            .iter()
            .map(|row| RowView {
                floor: row.floor.clone(),
                cells: columns
                    .iter()
                    .map(|key| {
                        let cell = row.cell_or_blank(key);
                        CellView {
                            unit: (*key).to_string(),
                            text: cell.text.clone(),
                            color: cell.color,
                            display: cell.color.display_hex().to_string(),
                        }
                    })
                    .collect(),
            })
            .collect();

        GridView {
            header: grid.display_header().cloned(),
            columns: columns.into_iter().map(str::to_string).collect(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{FloorRow, UnitCell};

    #[test]
    fn test_view_uses_export_column_order() {
        let grid = Grid::new(vec![
            FloorRow::new("2F")
                .with_unit("202", UnitCell::new("", PaletteColor::Yellow))
                .with_unit("201", UnitCell::new("A", PaletteColor::Green)),
            FloorRow::new("1F").with_unit("101", UnitCell::new("B", PaletteColor::Pink)),
        ]);
        let view = GridView::from(&grid);

        assert_eq!(view.columns, vec!["201", "202"]);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].cells[0].text, "A");
        assert_eq!(view.rows[0].cells[1].display, "#FFFFCC");
        // second row has none of the first row's keys
        assert!(view.rows[1].cells.iter().all(|c| c.text.is_empty()));
        assert!(view.rows[1].cells.iter().all(|c| c.color == PaletteColor::White));
        assert!(view.header.is_none());
    }
}
