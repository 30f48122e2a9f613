use std::sync::Arc;

use crate::catalog::FieldCatalog;
use crate::classify::outcome::{ColumnMapping, Verdict, WorksheetClassification};
use crate::matching::{HeaderMatchResult, HeaderMatcher};
use crate::model::{RecognitionStatus, SheetKind, SheetType};
use crate::settings::ImportSettings;

/// Match results of one header row against both kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub contract: HeaderMatchResult,
    pub procurement: HeaderMatchResult,
}

impl Evaluation {
    pub fn get(&self, kind: SheetKind) -> &HeaderMatchResult {
        match kind {
            SheetKind::Contract => &self.contract,
            SheetKind::Procurement => &self.procurement,
        }
    }

    /// The larger of the two match counts.
    pub fn best_count(&self) -> usize {
        self.contract.matched_count.max(self.procurement.matched_count)
    }

    /// The kind with strictly more matches, if any.
    pub fn stronger(&self) -> Option<SheetKind> {
        use std::cmp::Ordering::*;
        match self
            .contract
            .matched_count
            .cmp(&self.procurement.matched_count)
        {
            Greater => Some(SheetKind::Contract),
            Less => Some(SheetKind::Procurement),
            Equal => None,
        }
    }
}

/// Decides contract / procurement / unknown for header rows.
#[derive(Debug, Clone)]
pub struct SheetClassifier {
    matcher: HeaderMatcher,
    catalog: Arc<FieldCatalog>,
    min_match_fields: usize,
}

impl SheetClassifier {
    pub fn new(matcher: HeaderMatcher, catalog: Arc<FieldCatalog>, min_match_fields: usize) -> Self {
        SheetClassifier {
            matcher,
            catalog,
            min_match_fields,
        }
    }

    pub fn from_settings(catalog: Arc<FieldCatalog>, settings: &ImportSettings) -> Self {
        SheetClassifier::new(
            HeaderMatcher::from_settings(settings),
            catalog,
            settings.min_match_fields,
        )
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn min_match_fields(&self) -> usize {
        self.min_match_fields
    }

    /// Run the matcher once per kind.
    pub fn evaluate<S: AsRef<str>>(&self, header: &[S]) -> Evaluation {
        Evaluation {
            contract: self
                .matcher
                .match_header(header, self.catalog.lookup(SheetKind::Contract)),
            procurement: self
                .matcher
                .match_header(header, self.catalog.lookup(SheetKind::Procurement)),
        }
    }

    /// Apply the threshold policy to an evaluation.
    pub fn decide(&self, evaluation: &Evaluation) -> Verdict {
        let contract = evaluation.contract.matched_count;
        let procurement = evaluation.procurement.matched_count;
        let best = contract.max(procurement);

        if best < self.min_match_fields {
            return Verdict::Shortfall {
                stronger: evaluation.stronger(),
                matched: best,
            };
        }
        match evaluation.stronger() {
            Some(kind) => Verdict::Recognized(kind),
            None => Verdict::Ambiguous { matched: best },
        }
    }

    /// Classify a single header row.
    ///
    /// Header position and row counts are left empty; the row extractor
    /// fills them in when it works on a whole worksheet.
    pub fn classify<S: AsRef<str>>(&self, header: &[S]) -> WorksheetClassification {
        let evaluation = self.evaluate(header);
        let verdict = self.decide(&evaluation);
        self.build(&evaluation, verdict)
    }

    /// Turn an evaluation and its verdict into a classification.
    pub fn build(&self, evaluation: &Evaluation, verdict: Verdict) -> WorksheetClassification {
        let (sheet_type, reported, failure_reason) = match verdict {
            Verdict::Recognized(kind) => (SheetType::from(kind), Some(kind), None),
            Verdict::Shortfall { stronger, matched } => (
                SheetType::Unknown,
                stronger,
                Some(format!(
                    "matched {} fields, need at least {}",
                    matched, self.min_match_fields
                )),
            ),
            Verdict::Ambiguous { matched } => (
                SheetType::Unknown,
                None,
                Some(format!(
                    "ambiguous header: matched {matched} contract fields and {matched} procurement fields"
                )),
            ),
        };

        let (matched_fields, columns) = match reported {
            Some(kind) => {
                let result = evaluation.get(kind);
                let columns: Vec<ColumnMapping> = result
                    .columns
                    .iter()
                    .map(|(col, m)| ColumnMapping {
                        column_index: *col,
                        header: m.header.clone(),
                        field: m.field.clone(),
                        confidence: m.confidence,
                    })
                    .collect();
                (result.matched_fields(), columns)
            }
            None => (Vec::new(), Vec::new()),
        };

        let recognition_status = if sheet_type == SheetType::Unknown {
            RecognitionStatus::Unrecognized
        } else {
            RecognitionStatus::Recognized
        };

        WorksheetClassification {
            sheet_name: String::new(),
            sheet_type,
            recognition_status,
            matched_fields_count: matched_fields.len(),
            matched_fields,
            columns,
            failure_reason,
            header_row_index: None,
            total_rows: 0,
            data_rows: 0,
        }
    }
}
