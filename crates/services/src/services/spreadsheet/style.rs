use board::{PaletteColor, palette::HEADER_FILL_RGB};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder};

/// Thin border on every side, centered both ways. Every emitted cell starts here.
fn boxed() -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

pub(crate) fn header() -> Format {
    boxed().set_bold().set_background_color(HEADER_FILL_RGB)
}

/// Floor label column.
pub(crate) fn label() -> Format {
    boxed()
}

pub(crate) fn unit(color: PaletteColor) -> Format {
    boxed().set_background_color(color.fill_rgb())
}

/// Unit cell whose text is colored by its status code, if it has one.
pub(crate) fn status(color: PaletteColor, font_rgb: Option<u32>) -> Format {
    match font_rgb {
        Some(rgb) => unit(color).set_font_color(rgb),
        None => unit(color),
    }
}
