use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open, ordered metadata attached to a document.
pub type Metadata = Map<String, Value>;

/// Flattened document fields as stored next to a vector.
pub type Payload = Map<String, Value>;

pub const MAX_TEXT_CHARS: usize = 10_000;
pub const MAX_URL_CHARS: usize = 2048;
pub const MAX_TITLE_CHARS: usize = 1024;
pub const MAX_METADATA_BYTES: usize = 64 * 1024;

/// Payload keys owned by the document itself. Metadata entries with these
/// names are dropped when the payload is built.
pub const RESERVED_KEYS: [&str; 4] = ["text", "url", "title", "indexed_at"];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },

    #[error("document {index}: {source}")]
    InBatch {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn in_batch(index: usize, source: ValidationError) -> Self {
        Self::InBatch {
            index,
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Document {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Check size and length bounds. Metadata shape is not inspected.
    pub fn normalize(self) -> Result<Document, ValidationError> {
        let text_len = self.text.chars().count();
        if text_len == 0 {
            return Err(ValidationError::field("text", "must not be empty"));
        }
        if text_len > MAX_TEXT_CHARS {
            return Err(ValidationError::field(
                "text",
                format!("{text_len} characters exceeds the limit of {MAX_TEXT_CHARS}"),
            ));
        }

        check_len("url", self.url.as_deref(), MAX_URL_CHARS)?;
        check_len("title", self.title.as_deref(), MAX_TITLE_CHARS)?;

        let metadata_bytes = serde_json::to_vec(&self.metadata)
            .map(|bytes| bytes.len())
            .map_err(|err| ValidationError::field("metadata", err.to_string()))?;
        if metadata_bytes > MAX_METADATA_BYTES {
            return Err(ValidationError::field(
                "metadata",
                format!("{metadata_bytes} bytes exceeds the limit of {MAX_METADATA_BYTES}"),
            ));
        }

        Ok(self)
    }

    /// Flatten into a store payload: document fields first, then the
    /// timestamp, then metadata.
    pub fn into_payload(self, indexed_at: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("text".into(), Value::String(self.text));
        payload.insert("url".into(), Value::String(self.url.unwrap_or_default()));
        payload.insert("title".into(), Value::String(self.title.unwrap_or_default()));
        payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));

        for (key, value) in self.metadata {
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::debug!("ignoring reserved metadata key {key:?}");
                continue;
            }
            payload.insert(key, value);
        }

        payload
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    let len = value.map(|v| v.chars().count()).unwrap_or(0);
    if len > max {
        return Err(ValidationError::field(
            field,
            format!("{len} characters exceeds the limit of {max}"),
        ));
    }
    Ok(())
}

/// Take at most `max` characters without splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_accepts_bounds() {
        assert!(Document::new("a").normalize().is_ok());
        assert!(Document::new("é".repeat(MAX_TEXT_CHARS)).normalize().is_ok());
    }

    #[test]
    fn test_normalize_rejects_empty_and_long_text() {
        let err = Document::new("").normalize().unwrap_err();
        assert!(matches!(err, ValidationError::Field { ref field, .. } if field == "text"));

        let err = Document::new("x".repeat(MAX_TEXT_CHARS + 1))
            .normalize()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_normalize_rejects_oversized_fields() {
        let doc = Document::new("ok").with_url("u".repeat(MAX_URL_CHARS + 1));
        assert!(doc.normalize().is_err());

        let doc = Document::new("ok").with_title("t".repeat(MAX_TITLE_CHARS + 1));
        assert!(doc.normalize().is_err());

        let doc = Document::new("ok").with_meta("blob", "b".repeat(MAX_METADATA_BYTES));
        let err = doc.normalize().unwrap_err();
        assert!(matches!(err, ValidationError::Field { ref field, .. } if field == "metadata"));
    }

    #[test]
    fn test_payload_flattening() {
        let doc = Document::new("fungal networks")
            .with_title("Mycelium")
            .with_meta("category", "ecology")
            .with_meta("tags", json!(["forest", "fungi"]));

        let payload = doc.into_payload("2024-11-22T10:00:00.000000Z");
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["text", "url", "title", "indexed_at", "category", "tags"]);
        assert_eq!(payload["url"], json!(""));
        assert_eq!(payload["title"], json!("Mycelium"));
        assert_eq!(payload["category"], json!("ecology"));
    }

    #[test]
    fn test_reserved_metadata_keys_do_not_override() {
        let doc = Document::new("real text")
            .with_meta("text", "spoofed")
            .with_meta("indexed_at", "yesterday");

        let payload = doc.into_payload("now");
        assert_eq!(payload["text"], json!("real text"));
        assert_eq!(payload["indexed_at"], json!("now"));
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let doc: Document = serde_json::from_value(json!({"text": "hello"})).unwrap();
        assert_eq!(doc.url, None);
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_batch_error_message() {
        let err = ValidationError::in_batch(3, ValidationError::field("text", "must not be empty"));
        assert_eq!(err.to_string(), "document 3: text: must not be empty");
    }
}
