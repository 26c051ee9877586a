//! Document sources.
//!
//! Each source walks a directory and turns the files it understands into
//! [`Document`]s. Sources only produce documents; pushing them to the API is
//! the job of [`crate::ingest`].

pub mod obsidian;
pub mod pdf;
pub mod table;
pub mod text;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::documents::{Document, Metadata};

/// File sources keep at most this many characters per document.
pub const MAX_FILE_TEXT_CHARS: usize = 8000;

/// Files whose trimmed text is shorter than this are not worth indexing.
pub const MIN_FILE_TEXT_CHARS: usize = 20;

pub trait DocumentSource: Send + Sync {
    /// Registry key, also recorded as the `source` metadata field.
    fn name(&self) -> &'static str;

    /// Extract every document under `root`. Files that cannot be read are
    /// logged and skipped.
    fn extract_documents(&self, root: &Path) -> Vec<Document>;
}

pub struct SourceRegistry {
    sources: Vec<Box<dyn DocumentSource>>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        let mut registry = Self { sources: vec![] };

        registry.sources.push(Box::new(text::TextSource));
        registry.sources.push(Box::new(table::CsvSource));
        registry.sources.push(Box::new(pdf::PdfSource));
        registry
            .sources
            .push(Box::new(obsidian::ObsidianVault::default()));

        registry
    }

    pub fn get(&self, name: &str) -> Option<&dyn DocumentSource> {
        self.sources
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Sources used when none are named: every plain file source.
    pub fn default_names() -> Vec<&'static str> {
        vec!["text", "csv", "pdf"]
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Files under `root` with the given extension, in path order.
pub fn files_with_extension(root: &Path, extension: &str, skip_hidden: bool) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry.file_name())))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

fn rfc3339(time: std::io::Result<SystemTime>) -> Value {
    match time {
        Ok(time) => Value::String(DateTime::<Utc>::from(time).to_rfc3339()),
        Err(_) => Value::Null,
    }
}

/// Content sniffing first, then the extension.
pub fn mime_type(path: &Path) -> Option<String> {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return Some(kind.mime_type().to_string());
    }

    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let mime = match ext.as_str() {
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "md" | "markdown" => "text/markdown",
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Metadata every file source records.
pub fn file_metadata(source: &str, path: &Path) -> std::io::Result<Metadata> {
    let stat = std::fs::metadata(path)?;

    let mut metadata = Metadata::new();
    metadata.insert("source".into(), source.into());
    metadata.insert("file_path".into(), path.to_string_lossy().into());
    metadata.insert(
        "file_name".into(),
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
            .into(),
    );
    metadata.insert("file_size".into(), stat.len().into());
    metadata.insert("created".into(), rfc3339(stat.created()));
    metadata.insert("modified".into(), rfc3339(stat.modified()));
    metadata.insert(
        "mime_type".into(),
        mime_type(path).map(Value::String).unwrap_or(Value::Null),
    );

    Ok(metadata)
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.to_string_lossy())
}

/// Read a file as text, replacing invalid UTF-8.
pub fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Run `extract` over every file, logging and skipping failures.
pub fn collect_documents<F>(source: &str, files: Vec<PathBuf>, extract: F) -> Vec<Document>
where
    F: Fn(&Path) -> anyhow::Result<Option<Document>>,
{
    let mut docs = vec![];
    for path in files {
        match extract(&path) {
            Ok(Some(doc)) => docs.push(doc),
            Ok(None) => log::debug!("{source}: skipping {path:?}"),
            Err(err) => log::warn!("{source}: error processing {path:?}: {err}"),
        }
    }
    log::info!("{source}: found {} documents", docs.len());
    docs
}
