use board::{Grid, unit_keys};

use super::{BASIC_SHEET_NAME, FLOOR_LABEL, SpreadsheetError, col_index, new_workbook, row_index, style};

const FLOOR_COLUMN_WIDTH: f64 = 8.0;
const UNIT_COLUMN_WIDTH: f64 = 12.0;

/// Basic layout: a header row of `층` and the unit keys in column order,
/// then one row per floor with every unit's text over its palette fill.
pub fn encode_basic(grid: &Grid) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = new_workbook(grid)?;
    let keys = unit_keys(grid);
    let header = style::header();
    let label = style::label();

    let sheet = workbook.add_worksheet();
    sheet.set_name(BASIC_SHEET_NAME)?;

    sheet.write_string_with_format(0, 0, FLOOR_LABEL, &header)?;
    for (i, key) in keys.iter().enumerate() {
        sheet.write_string_with_format(0, col_index(i + 1)?, *key, &header)?;
    }

    for (i, floor) in grid.data.iter().enumerate() {
        let row = row_index(i + 1)?;
        sheet.write_string_with_format(row, 0, &floor.floor, &label)?;
        for (j, key) in keys.iter().enumerate() {
            let cell = floor.cell_or_blank(key);
            sheet.write_string_with_format(row, col_index(j + 1)?, &cell.text, &style::unit(cell.color))?;
        }
    }

    sheet.set_column_width(0, FLOOR_COLUMN_WIDTH)?;
    for i in 0..keys.len() {
        sheet.set_column_width(col_index(i + 1)?, UNIT_COLUMN_WIDTH)?;
    }

    tracing::debug!(
        "Encoded basic layout: {} floors x {} units",
        grid.data.len(),
        keys.len()
    );
    Ok(workbook.save_to_buffer()?)
}
