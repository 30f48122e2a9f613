//! Row extraction: locate the header row of a worksheet, finalize its
//! classification and walk the data rows below it.

pub mod header;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::{Enumerate, Skip};
use std::slice;

use crate::catalog::FieldDefinition;
use crate::classify::{SheetClassifier, WorksheetClassification};
use crate::cleaning::apply_rules;
use crate::model::{CellValue, ExtractedRecord, FieldError, FieldValue};
use crate::settings::ImportSettings;
use header::{is_blank_row, locate_header, HeaderLocation};

/// A data row rejected because required fields were empty or failed cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub source_row_index: usize,
    /// Cleaning failures seen before the row was rejected.
    pub field_errors: Vec<FieldError>,
    /// Required fields that ended up without a value, in catalog order.
    pub missing_required: Vec<String>,
}

/// What happened to one data row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(ExtractedRecord),
    Rejected(RejectedRow),
}

impl RowOutcome {
    pub fn source_row_index(&self) -> usize {
        match self {
            RowOutcome::Accepted(r) => r.source_row_index,
            RowOutcome::Rejected(r) => r.source_row_index,
        }
    }

    /// True when the row is rejected or carries field errors.
    pub fn is_error(&self) -> bool {
        match self {
            RowOutcome::Accepted(r) => r.has_errors(),
            RowOutcome::Rejected(_) => true,
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            RowOutcome::Accepted(r) => &r.errors,
            RowOutcome::Rejected(r) => &r.field_errors,
        }
    }
}

/// A worksheet's final classification plus its lazy row sequence.
pub struct Extraction<'a> {
    pub classification: WorksheetClassification,
    pub records: Records<'a>,
}

/// Extracts typed rows from worksheet grids.
#[derive(Debug, Clone, Copy)]
pub struct RowExtractor<'a> {
    classifier: &'a SheetClassifier,
    settings: &'a ImportSettings,
}

impl<'a> RowExtractor<'a> {
    pub fn new(classifier: &'a SheetClassifier, settings: &'a ImportSettings) -> Self {
        RowExtractor {
            classifier,
            settings,
        }
    }

    /// Classify `cells` and prepare its rows.
    ///
    /// The returned records are produced on demand, in source row order.
    /// They are empty unless the worksheet is recognized.
    pub fn extract(&self, sheet_name: &str, cells: &'a [Vec<CellValue>]) -> Extraction<'a> {
        let location = locate_header(self.classifier, cells, self.settings.header_scan_rows);

        let (mut classification, header_row) = match &location {
            HeaderLocation::Found {
                row_index,
                evaluation,
            } => {
                let verdict = self.classifier.decide(evaluation);
                let mut c = self.classifier.build(evaluation, verdict);
                c.header_row_index = Some(*row_index);
                c.data_rows = self.count_data_rows(&cells[row_index + 1..]);
                (c, Some(*row_index))
            }
            HeaderLocation::NotFound { .. } => {
                let mut c = self.classifier.classify::<&str>(&[]);
                c.failure_reason = location.failure_reason(
                    self.settings.header_scan_rows,
                    self.classifier.min_match_fields(),
                );
                (c, None)
            }
        };
        classification.sheet_name = sheet_name.to_string();
        classification.total_rows = cells.len();

        let records = match (header_row, classification.kind()) {
            (Some(row), Some(kind)) => {
                let fields = self.classifier.catalog().lookup(kind);
                Records::new(cells, row + 1, &classification, fields, self.settings)
            }
            _ => Records::empty(cells, self.settings),
        };

        Extraction {
            classification,
            records,
        }
    }

    fn count_data_rows(&self, rows: &[Vec<CellValue>]) -> usize {
        if self.settings.skip_empty_rows {
            rows.iter().filter(|r| !is_blank_row(r)).count()
        } else {
            rows.len()
        }
    }
}

struct ColumnPlan<'a> {
    column: usize,
    field: &'a FieldDefinition,
}

/// Lazy, single-pass sequence of row outcomes for one worksheet.
pub struct Records<'a> {
    rows: Skip<Enumerate<slice::Iter<'a, Vec<CellValue>>>>,
    plan: Vec<ColumnPlan<'a>>,
    /// Required fields with no column in the header.
    unmapped_required: Vec<&'a str>,
    /// Required fields in catalog order.
    required: Vec<&'a str>,
    skip_empty_rows: bool,
    trim_whitespace: bool,
    validate_data: bool,
}

impl<'a> Records<'a> {
    fn new(
        cells: &'a [Vec<CellValue>],
        first_data_row: usize,
        classification: &WorksheetClassification,
        fields: &'a [FieldDefinition],
        settings: &ImportSettings,
    ) -> Self {
        let plan: Vec<ColumnPlan<'a>> = classification
            .columns
            .iter()
            .filter_map(|m| {
                fields
                    .iter()
                    .find(|f| f.canonical_name == m.field)
                    .map(|field| ColumnPlan {
                        column: m.column_index,
                        field,
                    })
            })
            .collect();

        let required: Vec<&'a str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.canonical_name.as_str())
            .collect();
        let unmapped_required = required
            .iter()
            .copied()
            .filter(|name| !plan.iter().any(|p| p.field.canonical_name == *name))
            .collect();

        Records {
            rows: cells.iter().enumerate().skip(first_data_row),
            plan,
            unmapped_required,
            required,
            skip_empty_rows: settings.skip_empty_rows,
            trim_whitespace: settings.trim_whitespace,
            validate_data: settings.validate_data,
        }
    }

    fn empty(cells: &'a [Vec<CellValue>], settings: &ImportSettings) -> Self {
        Records {
            rows: cells.iter().enumerate().skip(cells.len()),
            plan: Vec::new(),
            unmapped_required: Vec::new(),
            required: Vec::new(),
            skip_empty_rows: settings.skip_empty_rows,
            trim_whitespace: settings.trim_whitespace,
            validate_data: settings.validate_data,
        }
    }

    /// Names of required fields that have no column in this worksheet.
    pub fn unmapped_required(&self) -> &[&'a str] {
        &self.unmapped_required
    }

    fn process(&self, row_index: usize, row: &[CellValue]) -> RowOutcome {
        let raw_fields: BTreeMap<usize, CellValue> = row
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_blank())
            .map(|(i, c)| (i, c.clone()))
            .collect();

        let mut fields = BTreeMap::new();
        let mut errors = Vec::new();

        for plan in &self.plan {
            let cell = row.get(plan.column).unwrap_or(&CellValue::Empty);
            // Whitespace-only cells are blank whether or not text is trimmed.
            let value = if cell.is_blank() {
                FieldValue::Empty
            } else if self.trim_whitespace {
                FieldValue::from_cell(cell).trimmed()
            } else {
                FieldValue::from_cell(cell)
            };
            match apply_rules(&plan.field.cleaning_rules, value) {
                Ok(v) if v.is_empty() => {}
                Ok(v) => {
                    fields.insert(plan.field.canonical_name.clone(), v);
                }
                Err(e) => errors.push(FieldError {
                    row_index,
                    column_index: plan.column,
                    field: plan.field.canonical_name.clone(),
                    raw_value: cell.to_string(),
                    message: e.to_string(),
                }),
            }
        }

        if self.validate_data {
            let missing_required: Vec<String> = self
                .required
                .iter()
                .filter(|name| !fields.contains_key(**name))
                .map(|name| name.to_string())
                .collect();
            if !missing_required.is_empty() {
                return RowOutcome::Rejected(RejectedRow {
                    source_row_index: row_index,
                    field_errors: errors,
                    missing_required,
                });
            }
        }

        RowOutcome::Accepted(ExtractedRecord {
            source_row_index: row_index,
            fields,
            raw_fields,
            errors,
        })
    }
}

impl Iterator for Records<'_> {
    type Item = RowOutcome;

    fn next(&mut self) -> Option<RowOutcome> {
        loop {
            let (row_index, row) = self.rows.next()?;
            if self.skip_empty_rows && is_blank_row(row) {
                continue;
            }
            tracing::trace!(row = row_index, "extracting row");
            return Some(self.process(row_index, row));
        }
    }
}
