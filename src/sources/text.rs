use std::path::Path;

use super::{
    collect_documents, file_metadata, file_stem, file_url, files_with_extension, read_lossy,
    DocumentSource, MAX_FILE_TEXT_CHARS, MIN_FILE_TEXT_CHARS,
};
use crate::documents::{truncate_chars, Document};

/// Plain `.txt` files.
pub struct TextSource;

impl TextSource {
    fn extract_file(&self, path: &Path) -> anyhow::Result<Option<Document>> {
        let content = read_lossy(path)?;
        if content.trim().chars().count() < MIN_FILE_TEXT_CHARS {
            return Ok(None);
        }

        let doc = Document {
            text: truncate_chars(&content, MAX_FILE_TEXT_CHARS),
            url: Some(file_url(path)),
            title: Some(file_stem(path)),
            metadata: file_metadata(self.name(), path)?,
        };
        Ok(Some(doc))
    }
}

impl DocumentSource for TextSource {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract_documents(&self, root: &Path) -> Vec<Document> {
        let files = files_with_extension(root, "txt", false);
        collect_documents(self.name(), files, |path| self.extract_file(path))
    }
}
