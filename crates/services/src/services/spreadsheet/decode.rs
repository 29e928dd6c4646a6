use std::{collections::HashSet, io::Cursor};

use board::{FloorRow, Grid, HeaderInfo, UnitCell};
use calamine::{Data, Range, Reader, Xlsx};

use super::{
    SpreadsheetError, is_spreadsheet_container,
    package::{CellFills, CoreProperties, column_letter},
};

/// Read a basic-layout workbook back into a board.
///
/// Only the first worksheet is read. Row 1 names the unit columns; a blank
/// or repeated name is replaced by the column letter. Every later row down to
/// the last written cell is a floor, blank rows included, so a workbook this
/// crate wrote reads back with the same row count.
pub fn decode(bytes: &[u8]) -> Result<Grid, SpreadsheetError> {
    if !is_spreadsheet_container(bytes) {
        return Err(SpreadsheetError::NotSpreadsheet);
    }
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)??;
    let fills = CellFills::read(bytes)?;

    let value_end = range.end();
    let last_row = value_end.map(|(row, _)| row).max(fills.last_row());
    let last_col = value_end.map(|(_, col)| col).max(fills.last_col_in_row(0));
    let (Some(last_row), Some(last_col)) = (last_row, last_col) else {
        return Err(SpreadsheetError::EmptyGrid);
    };

    let columns = unit_columns(&range, last_col);
    let mut data = Vec::new();
    for row in 1..=last_row {
        let mut floor = FloorRow::new(cell_text(&range, row, 0));
        for (col, key) in &columns {
            let cell = UnitCell::new(cell_text(&range, row, *col), fills.color_at(row, *col));
            floor.units.insert(key.clone(), cell);
        }
        data.push(floor);
    }

    let props = CoreProperties::read(bytes)?;
    let header = HeaderInfo {
        building: props.subject,
        name: props.title,
    };
    tracing::debug!(
        "Decoded {} floors x {} units from workbook",
        data.len(),
        columns.len()
    );

    let grid = Grid::new(data);
    Ok(if header.is_empty() {
        grid
    } else {
        grid.with_header(header)
    })
}

fn unit_columns(range: &Range<Data>, last_col: u32) -> Vec<(u32, String)> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for col in 1..=last_col {
        let label = cell_text(range, 0, col);
        let mut key = if label.is_empty() || seen.contains(&label) {
            column_letter(col)
        } else {
            label
        };
        while seen.contains(&key) {
            key.push('_');
        }
        seen.insert(key.clone());
        columns.push((col, key));
    }
    columns
}

fn cell_text(range: &Range<Data>, row: u32, col: u32) -> String {
    match range.get_value((row, col)) {
        None | Some(Data::Empty) => String::new(),
        Some(value) => value.to_string().trim().to_string(),
    }
}
