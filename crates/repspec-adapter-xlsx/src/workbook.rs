//! In-memory workbook model
//!
//! The writer and reader work on this model; the `.xlsx` backend only copies
//! it to and from a container file. Rows and columns are 1-based.

use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Cell content
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Cell content for a scalar document value; `None` for containers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Empty),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Document value of this cell. Whole numbers come back as integers.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Value::Number(Number::from(*n as i64))
                } else {
                    Number::from_f64(*n).map_or(Value::Null, Value::Number)
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Cell presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStyle {
    #[default]
    Plain,
    /// Sheet title in row 1
    Title,
    /// Column headings of flat sheets
    Heading,
    /// Labels and schema-derived annotations
    Label,
    /// Labels of grid-variable columns
    GridLabel,
    /// Cells meant for data entry
    Value,
    /// Labels of fields the schema does not describe
    Unknown,
}

/// One cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

/// One named sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

static EMPTY: CellValue = CellValue::Empty;

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Set the value at (`row`, `col`), keeping its style.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        self.cells.entry((row, col)).or_default().value = value.into();
    }

    /// Set the style at (`row`, `col`), keeping its value.
    pub fn style(&mut self, row: u32, col: u32, style: CellStyle) {
        self.cells.entry((row, col)).or_default().style = style;
    }

    /// Set value and style together.
    pub fn put(&mut self, row: u32, col: u32, value: impl Into<CellValue>, style: CellStyle) {
        self.cells.insert(
            (row, col),
            Cell {
                value: value.into(),
                style,
            },
        );
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        self.cells.get(&(row, col)).map_or(&EMPTY, |c| &c.value)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Non-empty text at (`row`, `col`).
    pub fn text(&self, row: u32, col: u32) -> Option<&str> {
        self.get(row, col).as_text()
    }

    /// Values of column `col` from `first_row` down to the first empty cell.
    pub fn column_from(&self, col: u32, first_row: u32) -> Vec<&CellValue> {
        (first_row..)
            .map(|row| self.get(row, col))
            .take_while(|value| !value.is_empty())
            .collect()
    }

    /// Every populated cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &Cell)> {
        self.cells.iter().map(|(pos, cell)| (*pos, cell))
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|(_, col)| *col).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Ordered collection of sheets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheet named `name`, created at the end when missing.
    pub fn sheet_or_insert(&mut self, name: &str) -> &mut Sheet {
        let position = match self.sheets.iter().position(|s| s.name == name) {
            Some(position) => position,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[position]
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
