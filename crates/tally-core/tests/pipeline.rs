//! Integration tests for the import orchestrator.
//!
//! Uses a MockReader that serves pre-built worksheets from memory, so these
//! tests never touch spreadsheet files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use tally_core::catalog::FieldCatalog;
use tally_core::error::TallyError;
use tally_core::import::{
    ImportErrorKind, ImportOrchestrator, JobId, JobStatus, MemorySink, RecordSink, SinkError,
};
use tally_core::model::{ExtractedRecord, FieldValue, FileMetadata, SheetKind, SheetType};
use tally_core::settings::{ImportSettings, MatchMode};
use tally_core::workbook::{Workbook, WorkbookReader, Worksheet};

#[derive(Default)]
struct MockReader {
    files: HashMap<String, Workbook>,
}

impl MockReader {
    fn with(mut self, path: &str, sheets: Vec<Worksheet>) -> Self {
        self.files.insert(
            path.to_string(),
            Workbook {
                path: PathBuf::from(path),
                sheets,
            },
        );
        self
    }
}

impl WorkbookReader for MockReader {
    fn open(&self, path: &Path) -> Result<Workbook, TallyError> {
        self.files
            .get(path.to_string_lossy().as_ref())
            .cloned()
            .ok_or_else(|| TallyError::workbook(path, "zip archive is corrupt"))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Blocks every `open` until the test releases it.
struct GatedReader {
    inner: MockReader,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl WorkbookReader for GatedReader {
    fn open(&self, path: &Path) -> Result<Workbook, TallyError> {
        if let Ok(gate) = self.gate.lock() {
            let _ = gate.recv();
        }
        self.inner.open(path)
    }

    fn backend_name(&self) -> &str {
        "gated"
    }
}

/// Rejects records whose contract number starts with "BAD".
struct PickySink {
    inner: MemorySink,
}

impl RecordSink for PickySink {
    fn persist(
        &self,
        kind: SheetKind,
        record: &ExtractedRecord,
        meta: &FileMetadata,
    ) -> Result<(), SinkError> {
        if let Some(FieldValue::Text(no)) = record.get("合同编号") {
            if no.starts_with("BAD") {
                return Err(SinkError(format!("duplicate contract number {no}")));
            }
        }
        self.inner.persist(kind, record, meta)
    }
}

/// Blocks the first `persist` until the test releases it, announcing that it is waiting.
struct GatedSink {
    inner: MemorySink,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedSink {
    fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = GatedSink {
            inner: MemorySink::new(),
            entered: Mutex::new(Some(entered_tx)),
            gate: Mutex::new(Some(release_rx)),
        };
        (Arc::new(sink), entered_rx, release_tx)
    }
}

impl RecordSink for GatedSink {
    fn persist(
        &self,
        kind: SheetKind,
        record: &ExtractedRecord,
        meta: &FileMetadata,
    ) -> Result<(), SinkError> {
        let entered = self.entered.lock().ok().and_then(|mut e| e.take());
        if let Some(entered) = entered {
            let _ = entered.send(());
            let gate = self.gate.lock().ok().and_then(|mut g| g.take());
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
        }
        self.inner.persist(kind, record, meta)
    }
}

async fn wait_until_persisting(entered: mpsc::Receiver<()>) {
    tokio::task::spawn_blocking(move || entered.recv())
        .await
        .unwrap()
        .unwrap();
}

fn contract_sheet() -> Worksheet {
    Worksheet::from_rows(
        "合同台账",
        &[
            &[],
            &["合同编号", "合同名称", "甲方", "乙方", "合同金额", "签订日期"],
            &["HT-2024-001", "办公楼维修", "某集团", "某建设公司", "120,000.00", "2024-03-01"],
            &["", "", "", "", "", ""],
            &["HT-2024-002", "绿化养护", "某集团", "某园林公司", "¥35,000", "2024年4月2日"],
        ],
    )
}

fn procurement_sheet() -> Worksheet {
    Worksheet::from_rows(
        "招采",
        &[
            &["招采编号", "招采名称", "采购人", "中标价", "采购方式"],
            &["ZB-01", "物业服务采购", "某集团", "880000", "公开招标"],
        ],
    )
}

fn orchestrator(reader: impl WorkbookReader + 'static, sink: Arc<dyn RecordSink>) -> ImportOrchestrator {
    ImportOrchestrator::new(
        Arc::new(reader),
        Arc::new(FieldCatalog::builtin().unwrap()),
        sink,
    )
}

async fn run(
    orch: &ImportOrchestrator,
    files: &[&str],
    settings: ImportSettings,
) -> tally_core::import::ImportJob {
    let id = orch
        .start(files.iter().map(|s| s.to_string()).collect(), settings)
        .await;
    orch.wait_for_completion(&id).await.unwrap()
}

// ---------------------------------------------------------------------------
// Test 1: Second file corrupt, job still completes
// ---------------------------------------------------------------------------
#[tokio::test]
async fn corrupt_second_file_does_not_abort_job() {
    let sink = Arc::new(MemorySink::new());
    let reader = MockReader::default().with("/data/a.xlsx", vec![contract_sheet()]);
    let orch = orchestrator(reader, sink.clone());

    let job = run(&orch, &["/data/a.xlsx", "/data/broken.xlsx"], ImportSettings::default()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.totals.files, 2);
    assert_eq!(job.totals.processed_files, 2);
    let file_errors: Vec<_> = job.errors_of(ImportErrorKind::File).collect();
    assert_eq!(file_errors.len(), 1);
    assert_eq!(file_errors[0].file_path.as_deref(), Some("/data/broken.xlsx"));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, SheetKind::Contract);
    assert_eq!(records[0].meta.file_name, "a.xlsx");
    assert_eq!(records[0].meta.sheet_name, "合同台账");
    assert_eq!(records[0].record.source_row_index, 2);
    assert_eq!(records[1].record.source_row_index, 4);
    assert_eq!(job.persisted(), 2);
}

// ---------------------------------------------------------------------------
// Test 2: Totals across files and sheets
// ---------------------------------------------------------------------------
#[tokio::test]
async fn totals_accumulate_across_files_and_sheets() {
    let sink = Arc::new(MemorySink::new());
    let reader = MockReader::default()
        .with("a.xlsx", vec![contract_sheet(), procurement_sheet()])
        .with(
            "b.xlsx",
            vec![Worksheet::from_rows(
                "说明",
                &[&["编号", "名称", "金额", "日期", "备注"], &["1", "x", "2", "", ""]],
            )],
        );
    let orch = orchestrator(reader, sink.clone());

    let job = run(&orch, &["a.xlsx", "b.xlsx"], ImportSettings::default()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.totals.sheets, 3);
    assert_eq!(job.totals.processed_sheets, 3);
    assert_eq!(job.totals.rows, 3);
    assert_eq!(job.totals.processed_rows, 3);
    assert_eq!(job.totals.error_rows, 0);
    assert!(job.totals.processed_rows <= job.totals.rows);

    let sheet_errors: Vec<_> = job.errors_of(ImportErrorKind::Sheet).collect();
    assert_eq!(sheet_errors.len(), 1);
    assert_eq!(sheet_errors[0].sheet_name.as_deref(), Some("说明"));

    let types: Vec<SheetType> = job
        .sheets
        .iter()
        .map(|s| s.classification.sheet_type)
        .collect();
    assert_eq!(
        types,
        vec![SheetType::Contract, SheetType::Procurement, SheetType::Unknown]
    );

    let kinds: Vec<SheetKind> = sink.records().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![SheetKind::Contract, SheetKind::Contract, SheetKind::Procurement]
    );
}

// ---------------------------------------------------------------------------
// Test 3: Unparseable required date with validation on
// ---------------------------------------------------------------------------
#[tokio::test]
async fn invalid_required_field_discards_row() {
    let sheet = Worksheet::from_rows(
        "Sheet1",
        &[
            &["合同编号", "合同名称", "甲方", "签订日期"],
            &["HT-1", "维修", "甲", "2024-03-01"],
            &["HT-2", "", "甲", "2024-03-01"],
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let orch = orchestrator(MockReader::default().with("c.xlsx", vec![sheet]), sink.clone());
    let settings = ImportSettings {
        validate_data: true,
        ..Default::default()
    };

    let job = run(&orch, &["c.xlsx"], settings).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.totals.processed_rows, 2);
    assert_eq!(job.totals.error_rows, 1);
    let row_errors: Vec<_> = job.errors_of(ImportErrorKind::Row).collect();
    assert_eq!(row_errors.len(), 1);
    assert_eq!(row_errors[0].row_index, Some(2));
    assert!(row_errors[0].message.contains("合同名称"));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn unparseable_required_date_records_field_and_row_errors() {
    let catalog = tally_core::catalog::parse_catalog_str(
        r#"{
            "name": "strict contracts", "version": "1", "kind": "contract",
            "fields": [
                { "name": "合同编号", "required": true },
                { "name": "合同名称" },
                { "name": "签订日期", "required": true, "cleaning": [{ "rule": "date" }] }
            ]
        }"#,
    )
    .unwrap();
    let sheet = Worksheet::from_rows(
        "Sheet1",
        &[
            &["合同编号", "合同名称", "签订日期"],
            &["HT-1", "维修", "2024-13-01"],
            &["HT-2", "保洁", "2024-03-01"],
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let orch = ImportOrchestrator::new(
        Arc::new(MockReader::default().with("e.xlsx", vec![sheet])),
        Arc::new(FieldCatalog::builtin().unwrap().with_catalog(&catalog)),
        sink.clone(),
    );
    let settings = ImportSettings {
        validate_data: true,
        ..Default::default()
    };

    let job = run(&orch, &["e.xlsx"], settings).await;

    assert_eq!(job.totals.error_rows, 1);
    let field_errors: Vec<_> = job.errors_of(ImportErrorKind::Field).collect();
    assert_eq!(field_errors.len(), 1);
    assert_eq!(field_errors[0].field.as_deref(), Some("签订日期"));
    assert_eq!(job.errors_of(ImportErrorKind::Row).count(), 1);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.records()[0].record.source_row_index, 2);
}

// ---------------------------------------------------------------------------
// Test 4: Field errors without validation keep the row
// ---------------------------------------------------------------------------
#[tokio::test]
async fn field_errors_without_validation_keep_partial_record() {
    let sheet = Worksheet::from_rows(
        "Sheet1",
        &[
            &["合同编号", "合同名称", "甲方", "合同金额"],
            &["HT-1", "维修", "甲", "面议"],
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let orch = orchestrator(MockReader::default().with("d.xlsx", vec![sheet]), sink.clone());

    let job = run(&orch, &["d.xlsx"], ImportSettings::default()).await;

    assert_eq!(job.totals.error_rows, 1);
    assert_eq!(job.errors_of(ImportErrorKind::Field).count(), 1);
    assert_eq!(job.errors_of(ImportErrorKind::Row).count(), 0);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.get("合同金额"), None);
    assert_eq!(records[0].record.errors.len(), 1);
}

// ---------------------------------------------------------------------------
// Test 5: Sink failures become row errors
// ---------------------------------------------------------------------------
#[tokio::test]
async fn sink_failure_is_row_error() {
    let sheet = Worksheet::from_rows(
        "Sheet1",
        &[
            &["合同编号", "合同名称", "甲方"],
            &["BAD-1", "维修", "甲"],
            &["HT-2", "保洁", "甲"],
        ],
    );
    let sink = Arc::new(PickySink {
        inner: MemorySink::new(),
    });
    let orch = orchestrator(MockReader::default().with("s.xlsx", vec![sheet]), sink.clone());

    let job = run(&orch, &["s.xlsx"], ImportSettings::default()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.totals.processed_rows, 2);
    assert_eq!(job.totals.error_rows, 1);
    let row_errors: Vec<_> = job.errors_of(ImportErrorKind::Row).collect();
    assert_eq!(row_errors.len(), 1);
    assert!(row_errors[0].message.contains("BAD-1"));
    assert_eq!(sink.inner.len(), 1);
    assert_eq!(job.persisted(), 1);
}

// ---------------------------------------------------------------------------
// Test 6: Orchestration faults fail the job
// ---------------------------------------------------------------------------
#[tokio::test]
async fn empty_file_list_fails_job() {
    let orch = orchestrator(MockReader::default(), Arc::new(MemorySink::new()));
    let job = run(&orch, &[], ImportSettings::default()).await;

    assert_eq!(job.status, JobStatus::Failed);
    let errors: Vec<_> = job.errors_of(ImportErrorKind::Orchestration).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("no input files"));
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn invalid_settings_fail_job() {
    let orch = orchestrator(
        MockReader::default().with("a.xlsx", vec![contract_sheet()]),
        Arc::new(MemorySink::new()),
    );
    let settings = ImportSettings {
        min_match_fields: 0,
        ..Default::default()
    };
    let job = run(&orch, &["a.xlsx"], settings).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.totals.processed_files, 0);
    assert_eq!(job.errors_of(ImportErrorKind::Orchestration).count(), 1);
}

// ---------------------------------------------------------------------------
// Test 7: Fuzzy mode recognizes near-miss headers
// ---------------------------------------------------------------------------
#[tokio::test]
async fn fuzzy_mode_recognizes_variant_headers() {
    let sheet = Worksheet::from_rows(
        "Sheet1",
        &[
            &["合同编号码", "合同名称", "甲方"],
            &["HT-1", "维修", "甲"],
        ],
    );
    let reader = MockReader::default().with("f.xlsx", vec![sheet]);
    let orch = orchestrator(reader, Arc::new(MemorySink::new()));

    let strict = run(&orch, &["f.xlsx"], ImportSettings::default()).await;
    assert_eq!(strict.sheets[0].classification.sheet_type, SheetType::Unknown);

    let fuzzy = run(
        &orch,
        &["f.xlsx"],
        ImportSettings {
            match_mode: MatchMode::Fuzzy,
            ..Default::default()
        },
    )
    .await;
    let classification = &fuzzy.sheets[0].classification;
    assert_eq!(classification.sheet_type, SheetType::Contract);
    assert!(classification.columns[0].confidence < 1.0);
}

// ---------------------------------------------------------------------------
// Test 8: Progress queries and clearing
// ---------------------------------------------------------------------------
#[tokio::test]
async fn unknown_job_is_not_found() {
    let orch = orchestrator(MockReader::default(), Arc::new(MemorySink::new()));
    let id = JobId::new();
    assert!(matches!(
        orch.get_progress(&id).await,
        Err(TallyError::JobNotFound(missing)) if missing == id
    ));
    assert!(orch.cancel(&id).await.is_err());
}

#[tokio::test]
async fn clear_progress_is_idempotent() {
    let orch = orchestrator(
        MockReader::default().with("a.xlsx", vec![contract_sheet()]),
        Arc::new(MemorySink::new()),
    );
    let id = orch
        .start(vec!["a.xlsx".into()], ImportSettings::default())
        .await;
    orch.wait_for_completion(&id).await.unwrap();
    assert!(orch.get_progress(&id).await.is_ok());

    orch.clear_progress(&id).await;
    assert!(orch.get_progress(&id).await.is_err());
    orch.clear_progress(&id).await;
    orch.clear_progress(&JobId::new()).await;
}

#[tokio::test]
async fn clear_progress_by_file() {
    let reader = MockReader::default()
        .with("a.xlsx", vec![contract_sheet()])
        .with("b.xlsx", vec![procurement_sheet()]);
    let orch = orchestrator(reader, Arc::new(MemorySink::new()));

    let first = orch.start(vec!["a.xlsx".into()], ImportSettings::default()).await;
    let second = orch
        .start(vec!["a.xlsx".into(), "b.xlsx".into()], ImportSettings::default())
        .await;
    let third = orch.start(vec!["b.xlsx".into()], ImportSettings::default()).await;
    for id in [first, second, third] {
        orch.wait_for_completion(&id).await.unwrap();
    }
    assert_eq!(orch.list_jobs().await.len(), 3);

    assert_eq!(orch.clear_progress_by_file("a.xlsx").await, 2);
    assert_eq!(orch.clear_progress_by_file("a.xlsx").await, 0);
    assert_eq!(orch.clear_progress_by_file("never-imported.xlsx").await, 0);

    let remaining = orch.list_jobs().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, third);
}

// ---------------------------------------------------------------------------
// Test 9: Cancellation stops before the next worksheet
// ---------------------------------------------------------------------------
#[tokio::test]
async fn cancel_stops_job() {
    let (release, gate) = mpsc::channel();
    let reader = GatedReader {
        inner: MockReader::default()
            .with("a.xlsx", vec![contract_sheet()])
            .with("b.xlsx", vec![procurement_sheet()]),
        gate: Mutex::new(gate),
    };
    let sink = Arc::new(MemorySink::new());
    let orch = orchestrator(reader, sink.clone());

    let id = orch
        .start(vec!["a.xlsx".into(), "b.xlsx".into()], ImportSettings::default())
        .await;
    orch.cancel(&id).await.unwrap();
    release.send(()).unwrap();
    release.send(()).unwrap();

    let job = orch.wait_for_completion(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.totals.processed_sheets, 0);
    assert!(sink.is_empty());
}

// ---------------------------------------------------------------------------
// Test 10: Cancellation between two worksheets of one file
// ---------------------------------------------------------------------------
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_between_worksheets() {
    let (sink, entered, release) = GatedSink::new();
    let orch = orchestrator(
        MockReader::default().with("a.xlsx", vec![contract_sheet(), procurement_sheet()]),
        sink.clone(),
    );

    let id = orch
        .start(vec!["a.xlsx".into()], ImportSettings::default())
        .await;
    wait_until_persisting(entered).await;
    orch.cancel(&id).await.unwrap();
    release.send(()).unwrap();

    let job = orch.wait_for_completion(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.totals.processed_sheets, 1);
    assert_eq!(job.sheets.len(), 1);
    assert_eq!(job.sheets[0].classification.sheet_type, SheetType::Contract);

    let records = sink.inner.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.kind == SheetKind::Contract));
}

// ---------------------------------------------------------------------------
// Test 11: Clearing a running job stops it
// ---------------------------------------------------------------------------
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_progress_stops_running_job() {
    let (sink, entered, release) = GatedSink::new();
    let orch = orchestrator(
        MockReader::default().with("a.xlsx", vec![contract_sheet(), procurement_sheet()]),
        sink.clone(),
    );

    let id = orch
        .start(vec!["a.xlsx".into()], ImportSettings::default())
        .await;
    let mut rx = orch.subscribe(&id).await.unwrap();
    wait_until_persisting(entered).await;
    orch.clear_progress(&id).await;
    release.send(()).unwrap();

    assert!(matches!(
        orch.get_progress(&id).await,
        Err(TallyError::JobNotFound(_))
    ));
    let job = rx
        .wait_for(|job| job.status.is_terminal())
        .await
        .unwrap()
        .clone();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(sink.inner.records().iter().all(|r| r.kind == SheetKind::Contract));
}

// ---------------------------------------------------------------------------
// Test 12: Subscribers observe a consistent final snapshot
// ---------------------------------------------------------------------------
#[tokio::test]
async fn subscriber_sees_terminal_snapshot() {
    let orch = orchestrator(
        MockReader::default().with("a.xlsx", vec![contract_sheet(), procurement_sheet()]),
        Arc::new(MemorySink::new()),
    );
    let id = orch
        .start(vec!["a.xlsx".into()], ImportSettings::default())
        .await;
    let mut rx = orch.subscribe(&id).await.unwrap();

    let job = rx
        .wait_for(|job| job.status.is_terminal())
        .await
        .unwrap()
        .clone();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current_step, "completed");
    assert!(job.totals.error_rows <= job.totals.processed_rows);
    assert!(job.totals.processed_rows <= job.totals.rows);
    assert_eq!(job.totals.processed_sheets, 2);
}
