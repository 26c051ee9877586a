//! Obsidian vaults: markdown notes with YAML frontmatter, `#tags` and
//! `[[wikilinks]]`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

use super::{
    collect_documents, file_metadata, file_stem, files_with_extension, read_lossy, DocumentSource,
    MAX_FILE_TEXT_CHARS,
};
use crate::documents::{truncate_chars, Document, Metadata};

const MAX_LINKS: usize = 10;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9/_-]*)").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static EMPTY_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s*$").unwrap());

#[derive(Debug, Clone, Default)]
pub struct ObsidianVault {
    /// Name used in `obsidian://` links. Defaults to the vault directory name.
    pub vault_name: Option<String>,
    pub include_hidden: bool,
}

/// Split leading `---` delimited YAML from the body. Malformed frontmatter is
/// left in the body.
pub fn split_frontmatter(content: &str) -> (Metadata, &str) {
    let Some(rest) = content.strip_prefix("---") else {
        return (Metadata::new(), content);
    };
    let Some((yaml, body)) = rest.split_once("---") else {
        return (Metadata::new(), content);
    };

    match serde_yml::from_str::<Value>(yaml) {
        Ok(Value::Object(frontmatter)) => (frontmatter, body.trim()),
        Ok(Value::Null) => (Metadata::new(), body.trim()),
        Ok(_) => {
            log::debug!("frontmatter is not a mapping, ignoring it");
            (Metadata::new(), body.trim())
        }
        Err(err) => {
            log::debug!("malformed frontmatter: {err}");
            (Metadata::new(), content)
        }
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = vec![];
    for item in items {
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

pub fn extract_tags(body: &str) -> Vec<String> {
    dedup(TAG_RE.captures_iter(body).map(|c| c[1].to_string()))
}

/// Link targets, without `|alias` suffixes.
pub fn extract_links(body: &str) -> Vec<String> {
    dedup(LINK_RE.captures_iter(body).map(|c| {
        let inner = &c[1];
        inner.split('|').next().unwrap_or(inner).trim().to_string()
    }))
}

pub fn clean_body(body: &str) -> String {
    let body = BLANK_LINES_RE.replace_all(body, "\n\n");
    let body = EMPTY_ITEM_RE.replace_all(&body, "");
    body.trim().to_string()
}

pub fn note_url(vault: &str, relative_path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("vault", vault)
        .append_pair("file", relative_path)
        .finish();
    format!("obsidian://open?{query}")
}

impl ObsidianVault {
    pub fn new(vault_name: Option<String>, include_hidden: bool) -> Self {
        Self {
            vault_name,
            include_hidden,
        }
    }

    fn vault_name(&self, root: &Path) -> String {
        self.vault_name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "vault".to_string())
        })
    }

    fn extract_note(&self, root: &Path, vault: &str, path: &Path) -> anyhow::Result<Option<Document>> {
        let content = read_lossy(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let (frontmatter, body) = split_frontmatter(&content);
        let tags = extract_tags(body);
        let links = extract_links(body);
        let body = clean_body(body);
        if body.is_empty() {
            return Ok(None);
        }

        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let mut metadata = file_metadata(self.name(), path)?;
        metadata.insert("file_path".into(), relative_path.clone().into());
        metadata.insert("tags".into(), tags.into());
        metadata.insert("link_count".into(), links.len().into());
        metadata.insert(
            "links".into(),
            links.into_iter().take(MAX_LINKS).collect::<Vec<_>>().into(),
        );
        for (key, value) in frontmatter {
            if key == "source" {
                continue;
            }
            metadata.insert(key, value);
        }

        let doc = Document {
            text: truncate_chars(&body, MAX_FILE_TEXT_CHARS),
            url: Some(note_url(vault, &relative_path)),
            title: Some(file_stem(path)),
            metadata,
        };
        Ok(Some(doc))
    }
}

impl DocumentSource for ObsidianVault {
    fn name(&self) -> &'static str {
        "obsidian"
    }

    fn extract_documents(&self, root: &Path) -> Vec<Document> {
        let vault = self.vault_name(root);
        let files = files_with_extension(root, "md", !self.include_hidden);
        log::info!("found {} markdown files in vault {vault:?}", files.len());

        collect_documents(self.name(), files, |path| self.extract_note(root, &vault, path))
    }
}
