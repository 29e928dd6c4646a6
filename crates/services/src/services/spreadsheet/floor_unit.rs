use board::{Grid, UnitCell, ascii_digits, palette::status_font_rgb, unit_keys};

use super::{
    FLOOR_LABEL, FLOOR_UNIT_SHEET_NAME, SpreadsheetError, col_index, new_workbook, row_index, style,
};

const FLOOR_COLUMN_WIDTH: f64 = 8.0;
const NUMBER_COLUMN_WIDTH: f64 = 10.0;
const DATA_COLUMN_WIDTH: f64 = 6.0;

/// Where the data half of each unit pair gets its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTextSource {
    /// The cell's own text, as sent by the client.
    CellText,
    /// `KT` / `M` / empty, derived from the cell's fill color.
    StatusCode,
}

impl CellTextSource {
    fn text(self, cell: &UnitCell) -> &str {
        match self {
            CellTextSource::CellText => &cell.text,
            CellTextSource::StatusCode => cell.color.status_code(),
        }
    }
}

/// `"5"` -> `"05"`, `"101"` -> `"101"`, `"B"` -> `""`.
fn padded_unit_number(key: &str) -> String {
    let digits = ascii_digits(key);
    if digits.is_empty() {
        digits
    } else {
        format!("{digits:0>2}")
    }
}

/// Floor-unit layout: every unit becomes a pair of columns under a merged
/// `NN호` header. Floors whose label has no digits are skipped.
pub fn encode_floor_unit(grid: &Grid, source: CellTextSource) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = new_workbook(grid)?;
    let units: Vec<(&str, String)> = unit_keys(grid)
        .into_iter()
        .map(|key| (key, padded_unit_number(key)))
        .collect();
    let header = style::header();
    let label = style::label();

    let sheet = workbook.add_worksheet();
    sheet.set_name(FLOOR_UNIT_SHEET_NAME)?;

    sheet.write_string_with_format(0, 0, FLOOR_LABEL, &header)?;
    for (i, (_, number)) in units.iter().enumerate() {
        let first = col_index(1 + i * 2)?;
        let title = if number.is_empty() {
            String::new()
        } else {
            format!("{number}호")
        };
        sheet.merge_range(0, first, 0, first + 1, &title, &header)?;
    }

    let mut row = 0;
    let mut skipped = 0;
    for floor in &grid.data {
        let floor_number = ascii_digits(&floor.floor);
        if floor_number.is_empty() {
            skipped += 1;
            continue;
        }
        row += 1;
        let r = row_index(row)?;
        sheet.write_string_with_format(r, 0, &floor_number, &label)?;

        for (i, (key, number)) in units.iter().enumerate() {
            let first = col_index(1 + i * 2)?;
            let cell = floor.cell_or_blank(key);
            let fill = style::unit(cell.color);
            if number.is_empty() {
                sheet.write_blank(r, first, &fill)?;
                sheet.write_blank(r, first + 1, &fill)?;
                continue;
            }
            let text = source.text(cell);
            sheet.write_string_with_format(r, first, format!("{floor_number}{number}"), &fill)?;
            sheet.write_string_with_format(
                r,
                first + 1,
                text,
                &style::status(cell.color, status_font_rgb(text)),
            )?;
        }
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} floors without a floor number", skipped);
    }

    sheet.set_column_width(0, FLOOR_COLUMN_WIDTH)?;
    for i in 0..units.len() {
        let first = col_index(1 + i * 2)?;
        sheet.set_column_width(first, NUMBER_COLUMN_WIDTH)?;
        sheet.set_column_width(first + 1, DATA_COLUMN_WIDTH)?;
    }

    tracing::debug!("Encoded floor-unit layout: {} floors x {} units", row, units.len());
    Ok(workbook.save_to_buffer()?)
}
