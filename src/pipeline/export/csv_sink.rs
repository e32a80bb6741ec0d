//! CSV writer for export rows.

use std::path::Path;

use super::{ExportError, ExportRow, TabularSink, EXPORT_HEADERS};

/// Writes rows with the `csv` crate, forcing the value column to text.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvSink;

impl TabularSink for CsvSink {
    fn write_rows(&self, destination: &Path, rows: &[ExportRow]) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_path(destination)
            .map_err(|e| ExportError::Sink(format!("{}: {e}", destination.display())))?;

        writer
            .write_record(EXPORT_HEADERS)
            .map_err(|e| ExportError::Sink(e.to_string()))?;
        for row in rows {
            let value = spreadsheet_text(&row.tracking_number);
            writer
                .write_record([row.filename.as_str(), value.as_str()])
                .map_err(|e| ExportError::Sink(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| ExportError::Sink(e.to_string()))?;

        tracing::info!(
            path = %destination.display(),
            rows = rows.len(),
            "CSV export written"
        );
        Ok(())
    }
}

/// `="value"`: spreadsheets keep it as literal text (no leading-zero loss,
/// no scientific notation on long digit runs).
pub fn spreadsheet_text(value: &str) -> String {
    format!("=\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(filename: &str, value: &str) -> ExportRow {
        ExportRow {
            filename: filename.into(),
            tracking_number: value.into(),
        }
    }

    #[test]
    fn wraps_value_as_text_formula() {
        assert_eq!(spreadsheet_text("5551234567"), "=\"5551234567\"");
        assert_eq!(spreadsheet_text("a\"b"), "=\"a\"\"b\"");
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        CsvSink
            .write_rows(&path, &[row("a.jpg", "1Z999AA10123456784"), row("b.jpg", "NONE")])
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["Filename", "Tracking Number"]
        );
        let records: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(
            records,
            vec![
                vec!["a.jpg".to_string(), "=\"1Z999AA10123456784\"".to_string()],
                vec!["b.jpg".to_string(), "=\"NONE\"".to_string()],
            ]
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("Filename,Tracking Number\n"), "{raw}");
        assert!(raw.contains("a.jpg,\"=\"\"1Z999AA10123456784\"\"\""), "{raw}");
    }

    #[test]
    fn unwritable_destination_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = CsvSink.write_rows(&path, &[row("a.jpg", "NONE")]).unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
    }
}
