use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{FieldCatalog, FieldProvider};
use crate::classify::SheetClassifier;
use crate::error::TallyError;
use crate::extract::{RowExtractor, RowOutcome};
use crate::import::job::{ImportError, ImportJob, JobId, JobStatus, SheetReport};
use crate::import::registry::{JobEntry, JobRegistry};
use crate::import::sink::RecordSink;
use crate::model::FileMetadata;
use crate::settings::ImportSettings;
use crate::workbook::{Workbook, WorkbookReader, Worksheet};

/// Runs import jobs in the background and answers progress queries.
///
/// Collaborators are injected; cloning shares the same job registry.
#[derive(Clone)]
pub struct ImportOrchestrator {
    reader: Arc<dyn WorkbookReader>,
    fields: Arc<dyn FieldProvider>,
    sink: Arc<dyn RecordSink>,
    registry: JobRegistry,
}

impl ImportOrchestrator {
    pub fn new(
        reader: Arc<dyn WorkbookReader>,
        fields: Arc<dyn FieldProvider>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        ImportOrchestrator {
            reader,
            fields,
            sink,
            registry: JobRegistry::new(),
        }
    }

    /// Register a job and start processing it on the Tokio runtime.
    ///
    /// Returns as soon as the job is tracked. Invalid settings or an empty
    /// file list still yield an id; the job then ends as `failed`.
    pub async fn start(&self, file_paths: Vec<String>, settings: ImportSettings) -> JobId {
        let id = JobId::new();
        let entry = self
            .registry
            .insert(ImportJob::new(id, file_paths.clone()))
            .await;
        info!(job_id = %id, files = file_paths.len(), "import job queued");

        let run = JobRun {
            reader: Arc::clone(&self.reader),
            sink: Arc::clone(&self.sink),
            catalog: Arc::new(FieldCatalog::snapshot(self.fields.as_ref())),
            entry,
            settings,
            file_paths,
        };
        tokio::spawn(run.execute());
        id
    }

    /// Snapshot of a tracked job.
    pub async fn get_progress(&self, id: &JobId) -> Result<ImportJob, TallyError> {
        self.registry
            .get(id)
            .await
            .map(|entry| entry.snapshot())
            .ok_or(TallyError::JobNotFound(*id))
    }

    /// Channel of snapshots, updated as the job advances.
    pub async fn subscribe(&self, id: &JobId) -> Result<watch::Receiver<ImportJob>, TallyError> {
        self.registry
            .get(id)
            .await
            .map(|entry| entry.subscribe())
            .ok_or(TallyError::JobNotFound(*id))
    }

    /// Ask a running job to stop before its next worksheet.
    pub async fn cancel(&self, id: &JobId) -> Result<(), TallyError> {
        let entry = self
            .registry
            .get(id)
            .await
            .ok_or(TallyError::JobNotFound(*id))?;
        entry.cancel_token().cancel();
        info!(job_id = %id, "import job cancellation requested");
        Ok(())
    }

    /// Forget a job. Unknown ids are ignored. A job still running is also
    /// cancelled so it stops at the next worksheet boundary.
    pub async fn clear_progress(&self, id: &JobId) {
        if let Some(entry) = self.registry.remove(id).await {
            entry.cancel_token().cancel();
            debug!(job_id = %id, "import job cleared");
        }
    }

    /// Forget every job that includes `file_path`. Returns how many were cleared.
    pub async fn clear_progress_by_file(&self, file_path: &str) -> usize {
        let removed = self.registry.remove_by_file(file_path).await;
        for entry in &removed {
            entry.cancel_token().cancel();
        }
        if !removed.is_empty() {
            debug!(file = file_path, jobs = removed.len(), "import jobs cleared by file");
        }
        removed.len()
    }

    pub async fn list_jobs(&self) -> Vec<ImportJob> {
        self.registry.snapshots().await
    }

    /// Wait until the job reaches a terminal status and return its final snapshot.
    pub async fn wait_for_completion(&self, id: &JobId) -> Result<ImportJob, TallyError> {
        let mut rx = self.subscribe(id).await?;
        let job = rx
            .wait_for(|job| job.status.is_terminal())
            .await
            .map_err(|_| TallyError::JobNotFound(*id))?
            .clone();
        Ok(job)
    }
}

/// Everything one background run needs, owned so the task is `'static`.
struct JobRun {
    reader: Arc<dyn WorkbookReader>,
    sink: Arc<dyn RecordSink>,
    catalog: Arc<FieldCatalog>,
    entry: Arc<JobEntry>,
    settings: ImportSettings,
    file_paths: Vec<String>,
}

impl JobRun {
    fn id(&self) -> JobId {
        self.entry.snapshot().id
    }

    async fn execute(self) {
        let id = self.id();
        self.entry.update(|job| {
            job.status = JobStatus::Processing;
            job.current_step = "validating settings".into();
        });

        if let Err(reason) = self.preflight() {
            warn!(job_id = %id, %reason, "import job failed");
            self.entry.update(|job| {
                job.errors.push(ImportError::orchestration(reason.to_string()));
                job.finish(JobStatus::Failed, "failed");
            });
            return;
        }

        let classifier = SheetClassifier::from_settings(Arc::clone(&self.catalog), &self.settings);
        let total = self.file_paths.len();
        info!(job_id = %id, files = total, "import job started");

        for (i, path) in self.file_paths.iter().enumerate() {
            if self.entry.cancel_token().is_cancelled() {
                return self.cancelled(id);
            }
            self.entry.update(|job| {
                job.current_step = format!("reading {} ({}/{})", file_name(path), i + 1, total);
            });

            match self.open(path).await {
                Ok(workbook) => {
                    info!(job_id = %id, file = %path, sheets = workbook.sheets.len(), "processing file");
                    self.entry
                        .update(|job| job.totals.sheets += workbook.sheets.len());

                    for sheet in &workbook.sheets {
                        if self.entry.cancel_token().is_cancelled() {
                            return self.cancelled(id);
                        }
                        self.process_sheet(&classifier, path, sheet);
                        tokio::task::yield_now().await;
                    }
                }
                Err(e) => {
                    warn!(job_id = %id, file = %path, error = %e, "file skipped");
                    self.entry
                        .update(|job| job.errors.push(ImportError::file(path, e.to_string())));
                }
            }

            self.entry.update(|job| job.totals.processed_files += 1);
            tokio::task::yield_now().await;
        }

        let totals = self.entry.snapshot().totals;
        info!(
            job_id = %id,
            files = totals.processed_files,
            sheets = totals.processed_sheets,
            rows = totals.processed_rows,
            error_rows = totals.error_rows,
            "import job completed"
        );
        self.entry
            .update(|job| job.finish(JobStatus::Completed, "completed"));
    }

    fn preflight(&self) -> Result<(), TallyError> {
        if self.file_paths.is_empty() {
            return Err(TallyError::NoInputFiles);
        }
        self.settings.validate()
    }

    fn cancelled(&self, id: JobId) {
        info!(job_id = %id, "import job cancelled");
        self.entry
            .update(|job| job.finish(JobStatus::Cancelled, "cancelled"));
    }

    /// Read a workbook off the async worker threads.
    async fn open(&self, path: &str) -> Result<Workbook, TallyError> {
        let reader = Arc::clone(&self.reader);
        let path_buf = PathBuf::from(path);
        tokio::task::spawn_blocking(move || reader.open(&path_buf))
            .await
            .map_err(|e| TallyError::workbook(path, format!("reader task failed: {e}")))?
    }

    fn process_sheet(&self, classifier: &SheetClassifier, path: &str, sheet: &Worksheet) {
        self.entry.update(|job| {
            job.current_step = format!("extracting {} / {}", file_name(path), sheet.name);
        });

        let extraction = RowExtractor::new(classifier, &self.settings).extract(&sheet.name, &sheet.cells);
        let classification = extraction.classification;
        debug!(
            file = %path,
            sheet = %sheet.name,
            sheet_type = %classification.sheet_type,
            matched = classification.matched_fields_count,
            header_row = ?classification.header_row_index,
            "worksheet classified"
        );

        let Some(kind) = classification.kind() else {
            let reason = classification
                .failure_reason
                .clone()
                .unwrap_or_else(|| "worksheet not recognized".into());
            warn!(file = %path, sheet = %sheet.name, %reason, "worksheet skipped");
            self.entry.update(|job| {
                job.errors.push(ImportError::sheet(path, &sheet.name, reason));
                job.totals.processed_sheets += 1;
                job.sheets.push(SheetReport {
                    file_path: path.to_string(),
                    classification,
                    persisted: 0,
                });
            });
            return;
        };

        self.entry
            .update(|job| job.totals.rows += classification.data_rows);

        let meta = FileMetadata {
            file_path: path.to_string(),
            file_name: file_name(path),
            sheet_name: sheet.name.clone(),
        };
        let mut persisted = 0;

        for outcome in extraction.records {
            let row = outcome.source_row_index();
            let mut errors: Vec<ImportError> = outcome
                .field_errors()
                .iter()
                .map(|fe| ImportError::field(path, &sheet.name, row, &fe.field, fe.message.clone()))
                .collect();
            let mut is_error = outcome.is_error();

            match outcome {
                RowOutcome::Accepted(record) => {
                    if let Err(e) = self.sink.persist(kind, &record, &meta) {
                        errors.push(ImportError::row(
                            path,
                            &sheet.name,
                            row,
                            format!("failed to persist record: {e}"),
                        ));
                        is_error = true;
                    } else {
                        persisted += 1;
                    }
                }
                RowOutcome::Rejected(rejected) => {
                    errors.push(ImportError::row(
                        path,
                        &sheet.name,
                        row,
                        format!(
                            "required fields missing or invalid: {}",
                            rejected.missing_required.join(", ")
                        ),
                    ));
                }
            }

            self.entry.update(|job| {
                job.totals.processed_rows += 1;
                if is_error {
                    job.totals.error_rows += 1;
                }
                job.errors.append(&mut errors);
            });
        }

        self.entry.update(|job| {
            job.totals.processed_sheets += 1;
            job.sheets.push(SheetReport {
                file_path: path.to_string(),
                classification,
                persisted,
            });
        });
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
