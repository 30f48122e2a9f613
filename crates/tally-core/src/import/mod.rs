//! Background import jobs over many files.

pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod sink;

pub use job::{ImportError, ImportErrorKind, ImportJob, JobId, JobStatus, JobTotals, SheetReport};
pub use orchestrator::ImportOrchestrator;
pub use sink::{MemorySink, NullSink, PersistedRecord, RecordSink, SinkError};
