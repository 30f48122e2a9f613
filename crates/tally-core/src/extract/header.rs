use crate::classify::{Evaluation, SheetClassifier};
use crate::model::CellValue;

/// Result of scanning a worksheet for its header row.
#[derive(Debug, Clone)]
pub enum HeaderLocation {
    Found {
        row_index: usize,
        evaluation: Evaluation,
    },
    NotFound {
        /// Non-blank rows examined.
        scanned: usize,
        /// Row with the most matches seen, and that count.
        best: Option<(usize, usize)>,
    },
}

impl HeaderLocation {
    pub fn failure_reason(&self, scan_rows: usize, min_match_fields: usize) -> Option<String> {
        match self {
            HeaderLocation::Found { .. } => None,
            HeaderLocation::NotFound { scanned: 0, .. } => {
                Some("no header row found: worksheet has no non-blank rows".to_string())
            }
            HeaderLocation::NotFound { best, .. } => {
                let (row, matched) = best.unwrap_or((0, 0));
                Some(format!(
                    "no header row found in the first {scan_rows} non-blank rows \
                     (best was row {row}: matched {matched} fields, need at least {min_match_fields})"
                ))
            }
        }
    }
}

/// Header text of a row, one entry per cell.
pub fn header_texts(row: &[CellValue]) -> Vec<String> {
    row.iter().map(|c| c.to_string()).collect()
}

pub fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

/// Scan from the top for the first row where either kind reaches the
/// classifier's threshold. Blank rows are skipped and do not count toward
/// `scan_rows`.
pub fn locate_header(
    classifier: &SheetClassifier,
    cells: &[Vec<CellValue>],
    scan_rows: usize,
) -> HeaderLocation {
    let mut scanned = 0;
    let mut best: Option<(usize, usize)> = None;

    for (row_index, row) in cells.iter().enumerate() {
        if scanned >= scan_rows {
            break;
        }
        if is_blank_row(row) {
            continue;
        }
        scanned += 1;

        let evaluation = classifier.evaluate(&header_texts(row));
        let count = evaluation.best_count();
        if count >= classifier.min_match_fields() {
            return HeaderLocation::Found {
                row_index,
                evaluation,
            };
        }
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((row_index, count));
        }
    }

    HeaderLocation::NotFound { scanned, best }
}
