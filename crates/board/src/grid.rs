use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;
use ts_rs::TS;

use crate::palette::PaletteColor;

/// Free-text metadata printed above a scanned board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct HeaderInfo {
    /// Building wing or dong identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    /// Property name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl HeaderInfo {
    /// True when neither field carries visible text.
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().is_none_or(|s| s.trim().is_empty());
        blank(&self.building) && blank(&self.name)
    }
}

/// One floor × unit intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(from = "RawUnitCell")]
pub struct UnitCell {
    pub text: String,
    pub color: PaletteColor,
}

static BLANK_CELL: UnitCell = UnitCell {
    text: String::new(),
    color: PaletteColor::White,
};

impl UnitCell {
    pub fn new(text: impl Into<String>, color: PaletteColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Wire forms a unit cell arrives in. Older recognizer builds emit a bare
/// label instead of an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnitCell {
    Cell {
        #[serde(default)]
        text: Option<Value>,
        #[serde(default)]
        color: Option<Value>,
    },
    Bare(Value),
}

impl From<RawUnitCell> for UnitCell {
    fn from(raw: RawUnitCell) -> Self {
        match raw {
            RawUnitCell::Cell { text, color } => UnitCell {
                text: text.map(value_text).unwrap_or_default(),
                color: match color {
                    Some(Value::String(name)) => PaletteColor::from_name(&name),
                    _ => PaletteColor::White,
                },
            },
            RawUnitCell::Bare(value) => UnitCell {
                text: value_text(value),
                color: PaletteColor::White,
            },
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// One row of the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FloorRow {
    /// Display label as scanned, e.g. `"25층"` or `"5F"`
    #[serde(default, deserialize_with = "deserialize_label")]
    pub floor: String,
    #[serde(default)]
    pub units: IndexMap<String, UnitCell>,
}

fn deserialize_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_text(Value::deserialize(deserializer)?))
}

impl FloorRow {
    pub fn new(floor: impl Into<String>) -> Self {
        Self {
            floor: floor.into(),
            units: IndexMap::new(),
        }
    }

    pub fn with_unit(mut self, key: impl Into<String>, cell: UnitCell) -> Self {
        self.units.insert(key.into(), cell);
        self
    }

    /// The cell under `key`, or a blank white cell when this row lacks it.
    pub fn cell_or_blank(&self, key: &str) -> &UnitCell {
        self.units.get(key).unwrap_or(&BLANK_CELL)
    }
}

/// A complete board: floors top to bottom plus optional header.
///
/// The column schema is taken from the first row only. Later rows that carry
/// a different key set are not reconciled: missing keys render blank and
/// extra keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Grid {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderInfo>,
    pub data: Vec<FloorRow>,
}

impl Grid {
    pub fn new(data: Vec<FloorRow>) -> Self {
        Self { header: None, data }
    }

    pub fn with_header(mut self, header: HeaderInfo) -> Self {
        self.header = Some(header);
        self
    }

    /// Header to show, if any of its fields has text.
    pub fn display_header(&self) -> Option<&HeaderInfo> {
        self.header.as_ref().filter(|h| !h.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Either accepted JSON shape for a board, resolved once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedInput {
    /// `{ "header"?: {...}, "data": [...] }`
    WithHeader(Grid),
    /// Bare `[FloorRow, ...]` from older recognizers
    Legacy(Vec<FloorRow>),
}

impl<'de> Deserialize<'de> for NormalizedInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_array() {
            serde_json::from_value(value)
                .map(NormalizedInput::Legacy)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(NormalizedInput::WithHeader)
                .map_err(D::Error::custom)
        }
    }
}

impl From<NormalizedInput> for Grid {
    fn from(input: NormalizedInput) -> Self {
        match input {
            NormalizedInput::WithHeader(grid) => grid,
            NormalizedInput::Legacy(rows) => Grid::new(rows),
        }
    }
}

/// All ASCII digits of `s`, concatenated in order.
pub fn ascii_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Sort value of a unit key: the number its digits spell, 0 when it has none.
pub fn unit_number(key: &str) -> u64 {
    let digits = ascii_digits(key);
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

/// Column order of a board: first-row keys, stably sorted by [`unit_number`].
pub fn unit_keys(grid: &Grid) -> Vec<&str> {
    let Some(first) = grid.data.first() else {
        return Vec::new();
    };
    let mut keys: Vec<&str> = first.units.keys().map(String::as_str).collect();
    keys.sort_by_key(|key| unit_number(key));
    keys
}
