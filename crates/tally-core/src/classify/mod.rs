pub mod engine;
pub mod outcome;

pub use engine::{Evaluation, SheetClassifier};
pub use outcome::{ColumnMapping, Verdict, WorksheetClassification};
