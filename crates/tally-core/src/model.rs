use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::cleaning::values::f64_to_decimal;

/// The two record kinds a worksheet can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Contract,
    Procurement,
}

impl SheetKind {
    /// Every kind, in the order the classifier evaluates them.
    pub const ALL: [SheetKind; 2] = [SheetKind::Contract, SheetKind::Procurement];

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Contract => "contract",
            SheetKind::Procurement => "procurement",
        }
    }

}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetType {
    Contract,
    Procurement,
    Unknown,
}

impl SheetType {
    /// The record kind, or `None` for unknown sheets.
    pub fn kind(&self) -> Option<SheetKind> {
        match self {
            SheetType::Contract => Some(SheetKind::Contract),
            SheetType::Procurement => Some(SheetKind::Procurement),
            SheetType::Unknown => None,
        }
    }
}

impl From<SheetKind> for SheetType {
    fn from(kind: SheetKind) -> Self {
        match kind {
            SheetKind::Contract => SheetType::Contract,
            SheetKind::Procurement => SheetType::Procurement,
        }
    }
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetType::Contract => write!(f, "contract"),
            SheetType::Procurement => write!(f, "procurement"),
            SheetType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStatus {
    Recognized,
    Unrecognized,
}

/// A cell as delivered by a workbook reader, before any cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Integral floats print without a trailing ".0" so numeric headers and ids read naturally.
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(dt) if dt.time() == chrono::NaiveTime::MIN => {
                write!(f, "{}", dt.date())
            }
            CellValue::Date(dt) => write!(f, "{dt}"),
        }
    }
}

/// A value after the cleaning rules of its field have run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

impl FieldValue {
    pub fn from_cell(cell: &CellValue) -> FieldValue {
        match cell {
            CellValue::Empty => FieldValue::Empty,
            CellValue::Text(s) => FieldValue::Text(s.clone()),
            // Keep numbers Decimal cannot hold as text so a number rule rejects them.
            CellValue::Number(n) => match f64_to_decimal(*n) {
                Some(d) => FieldValue::Number(d),
                None => FieldValue::Text(cell.to_string()),
            },
            CellValue::Bool(b) => FieldValue::Bool(*b),
            CellValue::Date(dt) => FieldValue::Date(dt.date()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Trim text values; whitespace-only text becomes `Empty`.
    pub fn trimmed(self) -> FieldValue {
        match self {
            FieldValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    FieldValue::Empty
                } else if t.len() == s.len() {
                    FieldValue::Text(s)
                } else {
                    FieldValue::Text(t.to_string())
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(d) => write!(f, "{d}"),
            FieldValue::Date(d) => write!(f, "{d}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A single cell that failed one of its field's cleaning rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub row_index: usize,
    pub column_index: usize,
    pub field: String,
    pub raw_value: String,
    pub message: String,
}

/// One data row mapped onto canonical fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Zero-based row index within the worksheet.
    pub source_row_index: usize,
    /// Cleaned values keyed by canonical field name. Empty values are omitted.
    pub fields: BTreeMap<String, FieldValue>,
    /// Non-empty raw cells keyed by column index, including unmapped columns.
    pub raw_fields: BTreeMap<usize, CellValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ExtractedRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Where a record came from, passed to the persistence sink alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path: String,
    pub file_name: String,
    pub sheet_name: String,
}
