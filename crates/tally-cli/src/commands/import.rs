use std::path::PathBuf;
use std::sync::Arc;

use tally_core::error::TallyError;
use tally_core::import::{ImportJob, ImportOrchestrator, JobId, JobStatus, NullSink, RecordSink};
use tally_core::workbook::CalamineReader;

use crate::output;
use crate::sink::JsonLinesSink;
use crate::SettingsArgs;

pub fn run(
    files: Vec<String>,
    out: Option<PathBuf>,
    output_format: &str,
    max_errors: usize,
    args: &SettingsArgs,
) -> Result<(), TallyError> {
    let settings = super::resolve_settings(args)?;
    let fields = Arc::new(super::resolve_catalog(args)?);

    let lines = match &out {
        Some(path) => Some(Arc::new(JsonLinesSink::create(path)?)),
        None => None,
    };
    let sink: Arc<dyn RecordSink> = match &lines {
        Some(lines) => lines.clone(),
        None => Arc::new(NullSink),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let job = runtime.block_on(async {
        let orchestrator = ImportOrchestrator::new(Arc::new(CalamineReader), fields, sink);
        let id = orchestrator.start(files, settings).await;
        follow(&orchestrator, &id).await?;
        orchestrator.wait_for_completion(&id).await
    })?;

    if let Some(lines) = &lines {
        lines.finish()?;
    }

    match output_format {
        "json" => output::json::print(&job)?,
        _ => output::table::print_job(&job, out.as_deref(), max_errors),
    }

    if job.status == JobStatus::Failed {
        let reason = job
            .errors
            .last()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| job.current_step.clone());
        return Err(TallyError::ImportFailed(reason));
    }
    Ok(())
}

/// Log each step change until the job reaches a terminal state.
async fn follow(orchestrator: &ImportOrchestrator, id: &JobId) -> Result<(), TallyError> {
    let mut rx = orchestrator.subscribe(id).await?;
    let mut last_step = String::new();
    loop {
        let job: ImportJob = rx.borrow_and_update().clone();
        if job.current_step != last_step {
            tracing::info!(
                job = %job.id,
                processed_files = job.totals.processed_files,
                files = job.totals.files,
                rows = job.totals.processed_rows,
                "{}",
                job.current_step
            );
            last_step = job.current_step;
        }
        if job.status.is_terminal() || rx.changed().await.is_err() {
            return Ok(());
        }
    }
}
