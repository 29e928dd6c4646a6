//! Direct reads of xlsx package parts for what calamine does not expose:
//! cell fills and document properties.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use board::PaletteColor;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use zip::ZipArchive;

use super::SpreadsheetError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const CORE_PART: &str = "docProps/core.xml";
const DEFAULT_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    fn open(bytes: &[u8]) -> Result<Self, SpreadsheetError> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes.to_vec()))?,
        })
    }

    /// The named part as text, or `None` when the package lacks it.
    fn part(&mut self, name: &str) -> Result<Option<String>, SpreadsheetError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut xml = String::new();
        file.read_to_string(&mut xml).map_err(|e| malformed(name, e))?;
        Ok(Some(xml))
    }

    /// Path of the first worksheet in workbook order.
    fn first_sheet_path(&mut self) -> Result<String, SpreadsheetError> {
        let Some(workbook) = self.part(WORKBOOK_PART)? else {
            return Ok(DEFAULT_SHEET_PART.to_string());
        };
        let mut first_id = None;
        each_element(WORKBOOK_PART, &workbook, |e| {
            if first_id.is_none() && e.local_name().as_ref() == b"sheet" {
                first_id = attr(e, b"id");
            }
        })?;
        let Some(id) = first_id else {
            return Ok(DEFAULT_SHEET_PART.to_string());
        };

        let Some(rels) = self.part(WORKBOOK_RELS_PART)? else {
            return Ok(DEFAULT_SHEET_PART.to_string());
        };
        let mut target = None;
        each_element(WORKBOOK_RELS_PART, &rels, |e| {
            if e.local_name().as_ref() == b"Relationship"
                && attr(e, b"Id").as_deref() == Some(id.as_str())
            {
                target = attr(e, b"Target");
            }
        })?;
        Ok(match target {
            Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
            Some(t) => format!("xl/{t}"),
            None => DEFAULT_SHEET_PART.to_string(),
        })
    }
}

fn malformed(part: &str, reason: impl ToString) -> SpreadsheetError {
    SpreadsheetError::Part {
        part: part.to_string(),
        reason: reason.to_string(),
    }
}

/// Value of the attribute whose local name is `name`.
fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

enum Node<'a> {
    Open(&'a BytesStart<'a>),
    Close(&'a [u8]),
}

/// Visit every element of `xml`. Self-closing elements are reported as
/// an `Open` followed by a `Close` with the local name.
fn walk(part: &str, xml: &str, mut visit: impl FnMut(Node<'_>)) -> Result<(), SpreadsheetError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => visit(Node::Open(&e)),
            Ok(Event::Empty(e)) => {
                visit(Node::Open(&e));
                visit(Node::Close(e.local_name().as_ref()));
            }
            Ok(Event::End(e)) => visit(Node::Close(e.local_name().as_ref())),
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(part, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn each_element(
    part: &str,
    xml: &str,
    mut on_open: impl FnMut(&BytesStart<'_>),
) -> Result<(), SpreadsheetError> {
    walk(part, xml, |node| {
        if let Node::Open(e) = node {
            on_open(e);
        }
    })
}

/// `"FFC6EFCE"` or `"C6EFCE"` -> `0xC6EFCE`. Alpha is dropped.
fn parse_rgb(value: &str) -> Option<u32> {
    if !value.is_ascii() {
        return None;
    }
    let hex = match value.len() {
        8 => &value[2..],
        6 => value,
        _ => return None,
    };
    u32::from_str_radix(hex, 16).ok()
}

/// `"B12"` -> `(11, 1)`, zero-based `(row, col)`.
pub(crate) fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        col = col.checked_mul(26)?.checked_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// Zero-based column index -> `"A"`, `"B"`, ..., `"AA"`.
pub(crate) fn column_letter(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Solid fill color of every styled cell on the first worksheet, plus the
/// last row that has any cell element at all.
#[derive(Debug, Default)]
pub(crate) struct CellFills {
    cells: HashMap<(u32, u32), u32>,
    last_row: Option<u32>,
}

impl CellFills {
    pub(crate) fn read(bytes: &[u8]) -> Result<Self, SpreadsheetError> {
        let mut package = Package::open(bytes)?;
        let xf_fills = match package.part(STYLES_PART)? {
            Some(styles) => style_fills(&styles)?,
            None => Vec::new(),
        };
        let sheet_path = package.first_sheet_path()?;
        let Some(sheet) = package.part(&sheet_path)? else {
            return Err(SpreadsheetError::NoWorksheet);
        };

        let mut cells = HashMap::new();
        let mut last_row = None;
        each_element(&sheet_path, &sheet, |e| {
            if e.local_name().as_ref() != b"c" {
                return;
            }
            let Some(pos) = attr(e, b"r").as_deref().and_then(parse_cell_ref) else {
                return;
            };
            last_row = last_row.max(Some(pos.0));
            let fill = attr(e, b"s")
                .and_then(|s| s.parse::<usize>().ok())
                .and_then(|xf| xf_fills.get(xf).copied().flatten());
            if let Some(rgb) = fill {
                cells.insert(pos, rgb);
            }
        })?;
        Ok(Self { cells, last_row })
    }

    /// Nearest palette color of the cell's fill; unfilled cells are white.
    pub(crate) fn color_at(&self, row: u32, col: u32) -> PaletteColor {
        self.cells
            .get(&(row, col))
            .map_or(PaletteColor::White, |rgb| PaletteColor::nearest(*rgb))
    }

    /// Last row holding a cell element, blank and unstyled ones included.
    pub(crate) fn last_row(&self) -> Option<u32> {
        self.last_row
    }

    /// Last column holding a filled cell on `row`.
    pub(crate) fn last_col_in_row(&self, row: u32) -> Option<u32> {
        self.cells
            .keys()
            .filter(|(r, _)| *r == row)
            .map(|(_, col)| *col)
            .max()
    }
}

/// For each entry of `cellXfs`, the RGB of its solid fill, if any.
fn style_fills(styles: &str) -> Result<Vec<Option<u32>>, SpreadsheetError> {
    let mut fills: Vec<Option<u32>> = Vec::new();
    let mut xf_fill_ids: Vec<Option<usize>> = Vec::new();
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut solid = false;

    walk(STYLES_PART, styles, |node| match node {
        Node::Open(e) => match e.local_name().as_ref() {
            b"fills" => in_fills = true,
            b"cellXfs" => in_cell_xfs = true,
            b"fill" if in_fills => {
                fills.push(None);
                solid = false;
            }
            b"patternFill" if in_fills => {
                solid = attr(e, b"patternType").as_deref() == Some("solid");
            }
            b"fgColor" if in_fills && solid => {
                if let (Some(last), Some(rgb)) =
                    (fills.last_mut(), attr(e, b"rgb").as_deref().and_then(parse_rgb))
                {
                    *last = Some(rgb);
                }
            }
            b"xf" if in_cell_xfs => {
                xf_fill_ids.push(attr(e, b"fillId").and_then(|id| id.parse().ok()));
            }
            _ => {}
        },
        Node::Close(b"fills") => in_fills = false,
        Node::Close(b"cellXfs") => in_cell_xfs = false,
        Node::Close(_) => {}
    })?;

    Ok(xf_fill_ids
        .into_iter()
        .map(|id| id.and_then(|id| fills.get(id).copied().flatten()))
        .collect())
}

/// Title and subject from the core document properties.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
}

impl CoreProperties {
    pub(crate) fn read(bytes: &[u8]) -> Result<Self, SpreadsheetError> {
        let mut package = Package::open(bytes)?;
        let Some(core) = package.part(CORE_PART)? else {
            return Ok(Self::default());
        };

        let mut reader = Reader::from_str(&core);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut props = Self::default();
        let mut current: Option<&'static str> = None;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    current = match e.name().as_ref() {
                        b"dc:title" => Some("title"),
                        b"dc:subject" => Some("subject"),
                        _ => None,
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| malformed(CORE_PART, e))?;
                    let text = text.trim();
                    if !text.is_empty() {
                        match current {
                            Some("title") => props.title = Some(text.to_string()),
                            Some("subject") => props.subject = Some(text.to_string()),
                            _ => {}
                        }
                    }
                }
                Ok(Event::End(_)) => current = None,
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed(CORE_PART, e)),
                _ => {}
            }
            buf.clear();
        }
        Ok(props)
    }
}
