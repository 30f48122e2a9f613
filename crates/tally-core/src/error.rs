use std::path::PathBuf;

use crate::import::job::JobId;

#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("failed to open workbook {path}: {reason}")]
    Workbook { path: PathBuf, reason: String },

    #[error("failed to load field catalog from {path}: {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    #[error("invalid field catalog: {0}")]
    CatalogInvalid(String),

    #[error("invalid import settings: {0}")]
    InvalidSettings(String),

    #[error("no input files were provided")]
    NoInputFiles,

    #[error("import job failed: {0}")]
    ImportFailed(String),

    #[error("import job '{0}' not found")]
    JobNotFound(JobId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TallyError {
    /// Wrap a reader-level failure for a given workbook path.
    pub fn workbook(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TallyError::Workbook {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
