use std::path::Path;

use tally_core::classify::WorksheetClassification;
use tally_core::import::{ImportErrorKind, ImportJob};

pub fn print_classifications(file: &Path, classifications: &[WorksheetClassification]) {
    println!("=== {} ===\n", file.display());

    if classifications.is_empty() {
        println!("  (no worksheets)\n");
        return;
    }

    let name_width = classifications
        .iter()
        .map(|c| c.sheet_name.chars().count())
        .max()
        .unwrap_or(10)
        .max(5);

    for c in classifications {
        let header = match c.header_row_index {
            Some(row) => format!("header row {}", row + 1),
            None => "no header".to_string(),
        };
        println!(
            "  {:<width$}  {:<11}  {} fields  {}  {} data rows",
            c.sheet_name,
            c.sheet_type.to_string(),
            c.matched_fields_count,
            header,
            c.data_rows,
            width = name_width
        );

        if c.is_recognized() {
            println!("      confidence {:.0}%", c.confidence() * 100.0);
            for col in &c.columns {
                let marker = if col.confidence < 1.0 {
                    format!(" ({:.0}%)", col.confidence * 100.0)
                } else {
                    String::new()
                };
                println!(
                    "      column {:<3} {} -> {}{}",
                    col.column_index + 1,
                    col.header,
                    col.field,
                    marker
                );
            }
        } else if let Some(ref reason) = c.failure_reason {
            println!("      {reason}");
        }
    }
    println!();
}

pub fn print_job(job: &ImportJob, out: Option<&Path>, max_errors: usize) {
    let t = &job.totals;
    println!("Import {} {}\n", job.id, job.status);
    println!("  Files:   {}/{}", t.processed_files, t.files);
    println!("  Sheets:  {}/{}", t.processed_sheets, t.sheets);
    println!(
        "  Rows:    {}/{} ({} with errors)",
        t.processed_rows, t.rows, t.error_rows
    );
    match out {
        Some(path) => println!("  Records: {} written to {}", job.persisted(), path.display()),
        None => println!("  Records: {}", job.persisted()),
    }
    println!();

    let recognized: Vec<_> = job
        .sheets
        .iter()
        .filter(|s| s.classification.is_recognized())
        .collect();
    if !recognized.is_empty() {
        println!("  Imported worksheets:");
        for s in recognized {
            println!(
                "    {} / {} -> {} ({} records)",
                s.file_path, s.classification.sheet_name, s.classification.sheet_type, s.persisted
            );
        }
        println!();
    }

    if job.errors.is_empty() {
        return;
    }

    let count = |kind| job.errors_of(kind).count();
    println!(
        "  Errors: {} file, {} sheet, {} row, {} field",
        count(ImportErrorKind::File),
        count(ImportErrorKind::Sheet),
        count(ImportErrorKind::Row),
        count(ImportErrorKind::Field),
    );
    for err in job.errors.iter().take(max_errors) {
        println!("    {err}");
    }
    if job.errors.len() > max_errors {
        println!("    ... and {} more", job.errors.len() - max_errors);
    }
    println!();
}
