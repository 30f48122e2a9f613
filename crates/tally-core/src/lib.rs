pub mod catalog;
pub mod classify;
pub mod cleaning;
pub mod error;
pub mod extract;
pub mod import;
pub mod matching;
pub mod model;
pub mod response;
pub mod settings;
pub mod workbook;

use std::path::Path;
use std::sync::Arc;

use catalog::FieldCatalog;
use classify::{SheetClassifier, WorksheetClassification};
use error::TallyError;
use extract::RowExtractor;
use settings::ImportSettings;
use workbook::WorkbookReader;

/// Classify every worksheet of one file without extracting rows.
///
/// Runs synchronously; use [`import::ImportOrchestrator`] for full imports.
pub fn inspect_workbook(
    path: &Path,
    reader: &dyn WorkbookReader,
    catalog: Arc<FieldCatalog>,
    settings: &ImportSettings,
) -> Result<Vec<WorksheetClassification>, TallyError> {
    settings.validate()?;
    let workbook = reader.open(path)?;
    let classifier = SheetClassifier::from_settings(catalog, settings);
    let extractor = RowExtractor::new(&classifier, settings);

    Ok(workbook
        .sheets
        .iter()
        .map(|sheet| extractor.extract(&sheet.name, &sheet.cells).classification)
        .collect())
}
