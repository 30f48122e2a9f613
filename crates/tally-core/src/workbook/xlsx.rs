use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::cleaning::values::excel_serial_to_datetime;
use crate::error::TallyError;
use crate::model::CellValue;
use crate::workbook::{Workbook, WorkbookReader, Worksheet};

/// Reads `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods` files through calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl WorkbookReader for CalamineReader {
    fn open(&self, path: &Path) -> Result<Workbook, TallyError> {
        let mut workbook = open_workbook_auto(path).map_err(|e| TallyError::workbook(path, e))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| TallyError::workbook(path, format!("sheet '{name}': {e}")))?;
            sheets.push(Worksheet::new(name, range_to_grid(&range)));
        }

        Ok(Workbook {
            path: path.to_path_buf(),
            sheets,
        })
    }

    fn backend_name(&self) -> &str {
        "calamine"
    }
}

/// Convert a calamine range to an absolute grid.
///
/// calamine ranges start at the first used cell; the grid is padded so
/// indices match sheet positions.
fn range_to_grid(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let pad = start_col as usize;

    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; pad];
        cells.extend(row.iter().map(convert_cell));
        while matches!(cells.last(), Some(CellValue::Empty)) {
            cells.pop();
        }
        grid.push(cells);
    }
    grid
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(ts) => CellValue::Date(ts),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Formula errors such as #N/A carry no usable value.
        Data::Error(_) => CellValue::Empty,
    }
}

fn parse_iso_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
