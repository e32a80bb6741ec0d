//! Export: a completed batch → sorted, one-value-per-file rows.
//!
//! Row building is pure and deterministic; exporting the same batch twice
//! yields identical output. Writing is delegated to a [`TabularSink`].

pub mod csv_sink;
pub mod rules;

pub use csv_sink::{spreadsheet_text, CsvSink};
pub use rules::{final_value, is_valid_tracking, normalize};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::batch::Batch;

pub const EXPORT_HEADERS: [&str; 2] = ["Filename", "Tracking Number"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("There are no results to export")]
    NothingToExport,

    #[error("Failed to write export: {0}")]
    Sink(String),
}

/// One exported line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub filename: String,
    /// Literal final value; sinks apply any presentation wrapping.
    pub tracking_number: String,
}

/// Tabular output destination.
pub trait TabularSink {
    fn write_rows(&self, destination: &Path, rows: &[ExportRow]) -> Result<(), ExportError>;
}

/// Build export rows ordered by file name. Does not touch the batch.
pub fn build_rows(batch: &Batch) -> Result<Vec<ExportRow>, ExportError> {
    if batch.results().is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut results: Vec<_> = batch.results().iter().collect();
    results.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    Ok(results
        .into_iter()
        .map(|result| ExportRow {
            filename: result.identifier.clone(),
            tracking_number: final_value(
                &result.fields.tracking_number,
                &result.fields.phone_number,
            )
            .to_string(),
        })
        .collect())
}

/// Build rows and write them to `destination`. Returns the row count.
pub fn export(
    batch: &Batch,
    sink: &dyn TabularSink,
    destination: &Path,
) -> Result<usize, ExportError> {
    let rows = build_rows(batch)?;
    sink.write_rows(destination, &rows)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelFields, LabelResult, Task};
    use std::cell::RefCell;

    fn ok(name: &str, tracking: &str, phone: &str) -> LabelResult {
        LabelResult::success(name, LabelFields::from_raw(Some(tracking), Some(phone)))
    }

    fn scenario_batch() -> Batch {
        Batch::from_results(vec![
            ok("c.jpg", "NONE", "5551234567"),
            LabelResult::failed("b.jpg", "Error: Network error: timeout"),
            ok("a.jpg", "1Z999AA10123456784", "NONE"),
        ])
    }

    #[derive(Default)]
    struct MemorySink {
        written: RefCell<Vec<(String, Vec<ExportRow>)>>,
    }

    impl TabularSink for MemorySink {
        fn write_rows(&self, destination: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
            self.written
                .borrow_mut()
                .push((destination.display().to_string(), rows.to_vec()));
            Ok(())
        }
    }

    struct BrokenSink;

    impl TabularSink for BrokenSink {
        fn write_rows(&self, _destination: &Path, _rows: &[ExportRow]) -> Result<(), ExportError> {
            Err(ExportError::Sink("disk full".into()))
        }
    }

    #[test]
    fn scenario_rows_sorted_with_fallbacks() {
        let rows = build_rows(&scenario_batch()).unwrap();
        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.filename.as_str(), r.tracking_number.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a.jpg", "1Z999AA10123456784"),
                ("b.jpg", "NONE"),
                ("c.jpg", "5551234567"),
            ]
        );
    }

    #[test]
    fn building_rows_is_deterministic() {
        let batch = scenario_batch();
        assert_eq!(build_rows(&batch).unwrap(), build_rows(&batch).unwrap());
    }

    #[test]
    fn empty_batch_has_nothing_to_export() {
        let sink = MemorySink::default();
        let empty = Batch::new(Vec::new());
        assert!(matches!(build_rows(&empty), Err(ExportError::NothingToExport)));
        assert!(matches!(
            export(&empty, &sink, Path::new("out.csv")),
            Err(ExportError::NothingToExport)
        ));
        assert!(sink.written.borrow().is_empty(), "no I/O on empty batch");
    }

    #[test]
    fn incomplete_batch_exports_received_results() {
        let mut batch = Batch::new(vec![Task::new("a.jpg"), Task::new("b.jpg")]);
        assert!(batch.record(ok("b.jpg", "CON12345", "NONE")));
        let rows = build_rows(&batch).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tracking_number, "NONE");
    }

    #[test]
    fn duplicate_identifiers_keep_arrival_order() {
        let batch = Batch::from_results(vec![
            ok("same.jpg", "1Z1", "NONE"),
            ok("same.jpg", "1Z2", "NONE"),
        ]);
        let rows = build_rows(&batch).unwrap();
        assert_eq!(rows[0].tracking_number, "1Z1");
        assert_eq!(rows[1].tracking_number, "1Z2");
    }

    #[test]
    fn export_hands_rows_to_sink_and_is_repeatable() {
        let batch = scenario_batch();
        let sink = MemorySink::default();

        assert_eq!(export(&batch, &sink, Path::new("labels.csv")).unwrap(), 3);
        assert_eq!(export(&batch, &sink, Path::new("labels.csv")).unwrap(), 3);

        let written = sink.written.borrow();
        assert_eq!(written[0].0, "labels.csv");
        assert_eq!(written[0].1, written[1].1);
    }

    #[test]
    fn sink_failure_leaves_batch_untouched() {
        let batch = scenario_batch();
        let err = export(&batch, &BrokenSink, Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
        assert_eq!(batch.results().len(), 3);
        assert!(build_rows(&batch).is_ok());
    }

    #[test]
    fn csv_export_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        export(&scenario_batch(), &CsvSink, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Filename,Tracking Number",
                "a.jpg,\"=\"\"1Z999AA10123456784\"\"\"",
                "b.jpg,\"=\"\"NONE\"\"\"",
                "c.jpg,\"=\"\"5551234567\"\"\"",
            ]
        );
    }
}
