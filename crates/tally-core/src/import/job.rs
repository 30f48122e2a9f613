use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::classify::WorksheetClassification;

/// Opaque identifier of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        JobId::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(JobId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTotals {
    pub files: usize,
    pub processed_files: usize,
    pub sheets: usize,
    pub processed_sheets: usize,
    pub rows: usize,
    pub processed_rows: usize,
    pub error_rows: usize,
}

/// Severity tier of an import error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportErrorKind {
    /// Unreadable or corrupt file; the file is skipped.
    File,
    /// No header row or ambiguous classification; the sheet is skipped.
    Sheet,
    /// A row was discarded or could not be persisted.
    Row,
    /// A single cell failed cleaning.
    Field,
    /// The job itself could not run.
    Orchestration,
}

impl fmt::Display for ImportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportErrorKind::File => "file",
            ImportErrorKind::Sheet => "sheet",
            ImportErrorKind::Row => "row",
            ImportErrorKind::Field => "field",
            ImportErrorKind::Orchestration => "orchestration",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    pub kind: ImportErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ImportError {
    pub fn orchestration(message: impl Into<String>) -> Self {
        ImportError {
            kind: ImportErrorKind::Orchestration,
            file_path: None,
            sheet_name: None,
            row_index: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn file(file_path: &str, message: impl Into<String>) -> Self {
        ImportError {
            kind: ImportErrorKind::File,
            file_path: Some(file_path.to_string()),
            ..ImportError::orchestration(message)
        }
    }

    pub fn sheet(file_path: &str, sheet_name: &str, message: impl Into<String>) -> Self {
        ImportError {
            kind: ImportErrorKind::Sheet,
            sheet_name: Some(sheet_name.to_string()),
            ..ImportError::file(file_path, message)
        }
    }

    pub fn row(file_path: &str, sheet_name: &str, row_index: usize, message: impl Into<String>) -> Self {
        ImportError {
            kind: ImportErrorKind::Row,
            row_index: Some(row_index),
            ..ImportError::sheet(file_path, sheet_name, message)
        }
    }

    pub fn field(
        file_path: &str,
        sheet_name: &str,
        row_index: usize,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        ImportError {
            kind: ImportErrorKind::Field,
            field: Some(field.to_string()),
            ..ImportError::row(file_path, sheet_name, row_index, message)
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(path) = &self.file_path {
            write!(f, " {path}")?;
        }
        if let Some(sheet) = &self.sheet_name {
            write!(f, " / {sheet}")?;
        }
        if let Some(row) = self.row_index {
            write!(f, " row {row}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " [{field}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome of one worksheet within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetReport {
    pub file_path: String,
    pub classification: WorksheetClassification,
    /// Records accepted by the persistence sink.
    pub persisted: usize,
}

/// Progress and outcome of one import run. Snapshots are cloned out of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: JobId,
    pub status: JobStatus,
    pub file_paths: Vec<String>,
    pub totals: JobTotals,
    pub errors: Vec<ImportError>,
    pub sheets: Vec<SheetReport>,
    pub current_step: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    pub fn new(id: JobId, file_paths: Vec<String>) -> Self {
        ImportJob {
            id,
            status: JobStatus::Pending,
            totals: JobTotals {
                files: file_paths.len(),
                ..Default::default()
            },
            file_paths,
            errors: Vec::new(),
            sheets: Vec::new(),
            current_step: "queued".to_string(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn errors_of(&self, kind: ImportErrorKind) -> impl Iterator<Item = &ImportError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub fn involves_file(&self, path: &str) -> bool {
        self.file_paths.iter().any(|p| p == path)
    }

    /// Total records accepted by the sink.
    pub fn persisted(&self) -> usize {
        self.sheets.iter().map(|s| s.persisted).sum()
    }

    pub(crate) fn finish(&mut self, status: JobStatus, step: impl Into<String>) {
        self.status = status;
        self.current_step = step.into();
        self.finished_at = Some(Utc::now());
    }
}
