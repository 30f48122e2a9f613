use std::sync::Mutex;

use crate::model::{ExtractedRecord, FileMetadata, SheetKind};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Persistence collaborator. Called once per accepted record, in source order.
pub trait RecordSink: Send + Sync {
    fn persist(
        &self,
        kind: SheetKind,
        record: &ExtractedRecord,
        meta: &FileMetadata,
    ) -> Result<(), SinkError>;
}

/// A record as handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub kind: SheetKind,
    pub record: ExtractedRecord,
    pub meta: FileMetadata,
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<PersistedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn persist(
        &self,
        kind: SheetKind,
        record: &ExtractedRecord,
        meta: &FileMetadata,
    ) -> Result<(), SinkError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SinkError("record store lock poisoned".into()))?;
        records.push(PersistedRecord {
            kind,
            record: record.clone(),
            meta: meta.clone(),
        });
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn persist(&self, _: SheetKind, _: &ExtractedRecord, _: &FileMetadata) -> Result<(), SinkError> {
        Ok(())
    }
}
