use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Fill behind header cells in every exported layout.
pub const HEADER_FILL_RGB: u32 = 0xDDDDDD;

/// Font color of a floor-unit data cell reading `KT`.
pub const KT_FONT_RGB: u32 = 0xFF0000;

/// Font color of a floor-unit data cell reading `M`.
pub const M_FONT_RGB: u32 = 0x00B050;

/// Logical background color of a unit cell.
///
/// Names are matched case-insensitively. Anything outside the table resolves
/// to [`PaletteColor::White`], so noisy recognition or import output never
/// aborts rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE", from = "String", into = "&'static str")]
pub enum PaletteColor {
    Yellow,
    Green,
    Pink,
    #[default]
    White,
}

struct Swatch {
    color: PaletteColor,
    name: &'static str,
    fill: u32,
    display: &'static str,
}

const SWATCHES: [Swatch; 4] = [
    Swatch {
        color: PaletteColor::Yellow,
        name: "YELLOW",
        fill: 0xFFFF99,
        display: "#FFFFCC",
    },
    Swatch {
        color: PaletteColor::Green,
        name: "GREEN",
        fill: 0xC6EFCE,
        display: "#C6EFCE",
    },
    Swatch {
        color: PaletteColor::Pink,
        name: "PINK",
        fill: 0xFFCCFF,
        display: "#FFCCFF",
    },
    Swatch {
        color: PaletteColor::White,
        name: "WHITE",
        fill: 0xFFFFFF,
        display: "#FFFFFF",
    },
];

impl PaletteColor {
    pub const ALL: [PaletteColor; 4] = [
        PaletteColor::Yellow,
        PaletteColor::Green,
        PaletteColor::Pink,
        PaletteColor::White,
    ];

    fn swatch(self) -> &'static Swatch {
        // SWATCHES is indexed in declaration order
        &SWATCHES[self as usize]
    }

    /// Resolve a logical name; unknown names fall back to white.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        SWATCHES
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.color)
            .unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        self.swatch().name
    }

    /// Spreadsheet fill as `0xRRGGBB`.
    pub fn fill_rgb(self) -> u32 {
        self.swatch().fill
    }

    /// Spreadsheet fill as six uppercase hex digits, no alpha.
    pub fn fill_hex(self) -> String {
        format!("{:06X}", self.fill_rgb())
    }

    /// CSS color used by the live preview.
    pub fn display_hex(self) -> &'static str {
        self.swatch().display
    }

    /// Closest palette entry to an arbitrary fill, by Euclidean distance in RGB.
    pub fn nearest(rgb: u32) -> Self {
        let (r, g, b) = split_rgb(rgb);
        let mut best = PaletteColor::White;
        let mut best_distance = i64::MAX;
        for swatch in &SWATCHES {
            let (sr, sg, sb) = split_rgb(swatch.fill);
            let distance = (r - sr).pow(2) + (g - sg).pow(2) + (b - sb).pow(2);
            if distance < best_distance {
                best_distance = distance;
                best = swatch.color;
            }
        }
        best
    }

    /// Status label a converted sheet shows for this color.
    pub fn status_code(self) -> &'static str {
        match self {
            PaletteColor::Green | PaletteColor::Pink => "KT",
            PaletteColor::Yellow => "M",
            PaletteColor::White => "",
        }
    }
}

/// Font color of a floor-unit data cell, if its text is a status code.
pub fn status_font_rgb(text: &str) -> Option<u32> {
    match text {
        "KT" => Some(KT_FONT_RGB),
        "M" => Some(M_FONT_RGB),
        _ => None,
    }
}

fn split_rgb(rgb: u32) -> (i64, i64, i64) {
    (
        ((rgb >> 16) & 0xFF) as i64,
        ((rgb >> 8) & 0xFF) as i64,
        (rgb & 0xFF) as i64,
    )
}

impl From<String> for PaletteColor {
    fn from(name: String) -> Self {
        PaletteColor::from_name(&name)
    }
}

impl From<PaletteColor> for &'static str {
    fn from(color: PaletteColor) -> Self {
        color.name()
    }
}

impl std::fmt::Display for PaletteColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(PaletteColor::from_name("green"), PaletteColor::Green);
        assert_eq!(PaletteColor::from_name(" Yellow "), PaletteColor::Yellow);
        assert_eq!(PaletteColor::from_name("PINK"), PaletteColor::Pink);
    }

    #[test]
    fn test_unknown_color_resolves_to_white() {
        let purple = PaletteColor::from_name("PURPLE");
        assert_eq!(purple, PaletteColor::White);
        assert_eq!(purple.fill_hex(), "FFFFFF");
        assert_eq!(purple.display_hex(), PaletteColor::White.display_hex());
        assert_eq!(PaletteColor::from_name(""), PaletteColor::White);
    }

    #[test]
    fn test_swatch_table_matches_variants() {
        for color in PaletteColor::ALL {
            assert_eq!(PaletteColor::from_name(color.name()), color);
        }
        assert_eq!(PaletteColor::Yellow.fill_hex(), "FFFF99");
        assert_eq!(PaletteColor::Yellow.display_hex(), "#FFFFCC");
        assert_eq!(PaletteColor::Green.fill_hex(), "C6EFCE");
    }

    #[test]
    fn test_nearest_color() {
        assert_eq!(PaletteColor::nearest(0xC6EFCE), PaletteColor::Green);
        assert_eq!(PaletteColor::nearest(0xC0F0C0), PaletteColor::Green);
        assert_eq!(PaletteColor::nearest(0xFFFF00), PaletteColor::Yellow);
        assert_eq!(PaletteColor::nearest(0xFFCCFF), PaletteColor::Pink);
        assert_eq!(PaletteColor::nearest(0xFEFEFE), PaletteColor::White);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PaletteColor::Green.status_code(), "KT");
        assert_eq!(PaletteColor::Pink.status_code(), "KT");
        assert_eq!(PaletteColor::Yellow.status_code(), "M");
        assert_eq!(PaletteColor::White.status_code(), "");
        assert_eq!(status_font_rgb("KT"), Some(KT_FONT_RGB));
        assert_eq!(status_font_rgb("M"), Some(M_FONT_RGB));
        assert_eq!(status_font_rgb("A"), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let color: PaletteColor = serde_json::from_str("\"pink\"").unwrap();
        assert_eq!(color, PaletteColor::Pink);
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"PINK\"");
        let unknown: PaletteColor = serde_json::from_str("\"teal\"").unwrap();
        assert_eq!(unknown, PaletteColor::White);
    }
}
