use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::TallyError;

/// Machine-readable failure category for front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidSettings,
    InvalidCatalog,
    Io,
    Workbook,
    Internal,
}

impl From<&TallyError> for ErrorKind {
    fn from(err: &TallyError) -> Self {
        match err {
            TallyError::JobNotFound(_) => ErrorKind::NotFound,
            TallyError::InvalidSettings(_) | TallyError::NoInputFiles | TallyError::Toml(_) => {
                ErrorKind::InvalidSettings
            }
            TallyError::CatalogLoad { .. } | TallyError::CatalogInvalid(_) => {
                ErrorKind::InvalidCatalog
            }
            TallyError::Io(_) => ErrorKind::Io,
            TallyError::Workbook { .. } => ErrorKind::Workbook,
            TallyError::ImportFailed(_) | TallyError::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Result of one front-end operation.
///
/// Serializes as `{"ok": true, "data": ...}` or
/// `{"ok": false, "error_kind": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    Ok(T),
    Err { kind: ErrorKind, message: String },
}

impl<T> Response<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

impl<T> From<Result<T, TallyError>> for Response<T> {
    fn from(result: Result<T, TallyError>) -> Self {
        match result {
            Ok(data) => Response::Ok(data),
            Err(e) => Response::Err {
                kind: ErrorKind::from(&e),
                message: e.to_string(),
            },
        }
    }
}

impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Response::Ok(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            Response::Err { kind, message } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error_kind", kind)?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}
