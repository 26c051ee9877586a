//! Pushing extracted documents to the daemon in batches.

use indicatif::{ProgressBar, ProgressStyle};

use crate::documents::Document;
use crate::semantic::BatchIndexResponse;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub submitted: usize,
    pub indexed: usize,
    pub errors: usize,
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Send `documents` in chunks of `batch_size`, one chunk at a time. A failed
/// chunk is logged and counted; later chunks still run.
pub fn push_in_batches<F>(documents: &[Document], batch_size: usize, mut send: F) -> IngestReport
where
    F: FnMut(&[Document]) -> anyhow::Result<BatchIndexResponse>,
{
    let mut report = IngestReport {
        submitted: documents.len(),
        ..Default::default()
    };
    if documents.is_empty() {
        return report;
    }

    let bar = progress_bar(documents.len() as u64);
    for chunk in documents.chunks(batch_size.max(1)) {
        match send(chunk) {
            Ok(resp) => report.indexed += resp.indexed_count,
            Err(err) => {
                log::error!("error indexing batch: {err}");
                report.errors += chunk.len();
            }
        }
        bar.inc(chunk.len() as u64);
        bar.set_message(format!("indexed {}", report.indexed));
    }
    bar.finish_and_clear();

    report
}
