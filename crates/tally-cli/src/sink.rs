use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use tally_core::error::TallyError;
use tally_core::import::{RecordSink, SinkError};
use tally_core::model::{ExtractedRecord, FieldError, FieldValue, FileMetadata, SheetKind};

/// Writes each accepted record as one JSON object per line.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

#[derive(Serialize)]
struct Line<'a> {
    kind: SheetKind,
    file: &'a str,
    sheet: &'a str,
    row: usize,
    fields: &'a BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "no_errors")]
    errors: &'a [FieldError],
}

fn no_errors(errors: &&[FieldError]) -> bool {
    errors.is_empty()
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, TallyError> {
        let file = File::create(path)?;
        Ok(JsonLinesSink {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Flush buffered lines to disk.
    pub fn finish(&self) -> Result<(), TallyError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("record writer lock poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

impl RecordSink for JsonLinesSink {
    fn persist(
        &self,
        kind: SheetKind,
        record: &ExtractedRecord,
        meta: &FileMetadata,
    ) -> Result<(), SinkError> {
        let line = Line {
            kind,
            file: &meta.file_path,
            sheet: &meta.sheet_name,
            row: record.source_row_index,
            fields: &record.fields,
            errors: &record.errors,
        };
        let json = serde_json::to_string(&line).map_err(|e| SinkError(e.to_string()))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError("record writer lock poisoned".into()))?;
        writeln!(writer, "{json}").map_err(|e| SinkError(e.to_string()))
    }
}
