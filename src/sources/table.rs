use serde_json::Value;
use std::path::Path;

use super::{
    collect_documents, file_metadata, file_stem, file_url, files_with_extension, read_lossy,
    DocumentSource,
};
use crate::documents::Document;

const SAMPLE_ROWS: usize = 5;

/// CSV files, indexed as one summary document per file.
pub struct CsvSource;

/// `"CSV file with N rows and columns: a, b"` followed by a few sample rows
/// rendered as `column: value` pairs.
pub fn summarize(columns: &[String], rows: &[Vec<String>]) -> String {
    let summary = format!(
        "CSV file with {} rows and columns: {}",
        rows.len(),
        columns.join(", ")
    );

    let sample: Vec<String> = rows
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(column, value)| format!("{column}: {value}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();

    format!("{summary}\n\nSample data:\n{}", sample.join("\n"))
}

impl CsvSource {
    fn extract_file(&self, path: &Path) -> anyhow::Result<Option<Document>> {
        let content = read_lossy(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut metadata = file_metadata(self.name(), path)?;
        metadata.insert("row_count".into(), rows.len().into());
        metadata.insert(
            "columns".into(),
            Value::Array(columns.iter().cloned().map(Value::String).collect()),
        );

        let doc = Document {
            text: summarize(&columns, &rows),
            url: Some(file_url(path)),
            title: Some(format!("{} (CSV)", file_stem(path))),
            metadata,
        };
        Ok(Some(doc))
    }
}

impl DocumentSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extract_documents(&self, root: &Path) -> Vec<Document> {
        let files = files_with_extension(root, "csv", false);
        collect_documents(self.name(), files, |path| self.extract_file(path))
    }
}
