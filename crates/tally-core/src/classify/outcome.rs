use serde::{Deserialize, Serialize};

use crate::model::{RecognitionStatus, SheetKind, SheetType};

/// A sheet column mapped onto a canonical field of the recognized kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column_index: usize,
    /// Header text as it appeared in the sheet.
    pub header: String,
    /// Canonical field name.
    pub field: String,
    /// 1.0 for exact and alias matches, lower for fuzzy matches.
    pub confidence: f64,
}

/// The recognition result for one worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetClassification {
    pub sheet_name: String,
    pub sheet_type: SheetType,
    pub recognition_status: RecognitionStatus,
    /// Canonical names of matched fields, in column order.
    pub matched_fields: Vec<String>,
    pub matched_fields_count: usize,
    pub columns: Vec<ColumnMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Zero-based index of the header row, if one was located.
    pub header_row_index: Option<usize>,
    /// Every row of the worksheet grid, blank rows included.
    pub total_rows: usize,
    /// Rows below the header, excluding skipped blank rows.
    pub data_rows: usize,
}

impl WorksheetClassification {
    pub fn is_recognized(&self) -> bool {
        self.recognition_status == RecognitionStatus::Recognized
    }

    pub fn kind(&self) -> Option<SheetKind> {
        self.sheet_type.kind()
    }

    /// Overall confidence: the mean column confidence, 0.0 when nothing matched.
    pub fn confidence(&self) -> f64 {
        if self.columns.is_empty() {
            return 0.0;
        }
        self.columns.iter().map(|c| c.confidence).sum::<f64>() / self.columns.len() as f64
    }
}

/// Why a header row did or did not resolve to a single kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Recognized(SheetKind),
    /// Neither kind reached the threshold. `stronger` is the kind with strictly more matches.
    Shortfall {
        stronger: Option<SheetKind>,
        matched: usize,
    },
    /// Both kinds reached the threshold with the same count.
    Ambiguous { matched: usize },
}
