pub mod xlsx;

use std::path::{Path, PathBuf};

use crate::error::TallyError;
use crate::model::CellValue;

pub use xlsx::CalamineReader;

/// One worksheet as a dense grid. Row and column indices are absolute
/// positions in the sheet, so row 0 is the sheet's first row even if empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub cells: Vec<Vec<CellValue>>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>, cells: Vec<Vec<CellValue>>) -> Self {
        Worksheet {
            name: name.into(),
            cells,
        }
    }

    /// Build a sheet of text cells; empty strings become empty cells.
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let cells = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| {
                        if s.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::text(*s)
                        }
                    })
                    .collect()
            })
            .collect();
        Worksheet::new(name, cells)
    }
}

/// All worksheets of one file, in their native order.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Trait for spreadsheet reading backends.
pub trait WorkbookReader: Send + Sync {
    /// Read every worksheet of the file at `path`.
    fn open(&self, path: &Path) -> Result<Workbook, TallyError>;

    /// Name of this reading backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
