use std::path::Path;

use super::{
    collect_documents, file_metadata, file_stem, file_url, files_with_extension, DocumentSource,
    MAX_FILE_TEXT_CHARS, MIN_FILE_TEXT_CHARS,
};
use crate::documents::{truncate_chars, Document};

/// PDF files. Only the text layer is used; scanned documents yield nothing.
pub struct PdfSource;

impl PdfSource {
    fn extract_file(&self, path: &Path) -> anyhow::Result<Option<Document>> {
        let text = pdf_extract::extract_text(path)
            .map_err(|err| anyhow::anyhow!("pdf extraction failed: {err}"))?;
        if text.trim().chars().count() < MIN_FILE_TEXT_CHARS {
            log::debug!("no extractable text in {path:?}");
            return Ok(None);
        }

        let doc = Document {
            text: truncate_chars(&text, MAX_FILE_TEXT_CHARS),
            url: Some(file_url(path)),
            title: Some(file_stem(path)),
            metadata: file_metadata(self.name(), path)?,
        };
        Ok(Some(doc))
    }
}

impl DocumentSource for PdfSource {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract_documents(&self, root: &Path) -> Vec<Document> {
        let files = files_with_extension(root, "pdf", false);
        collect_documents(self.name(), files, |path| self.extract_file(path))
    }
}
