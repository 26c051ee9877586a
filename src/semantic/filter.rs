//! Metadata filter composition.
//!
//! A filter is a list of equality conditions that must all hold. It can be
//! rendered to the vector store's filter syntax or evaluated directly against
//! a payload (used by the in-memory store).

use serde_json::{json, Value};

use crate::documents::{Metadata, Payload, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    must: Vec<FieldCondition>,
}

impl MetadataFilter {
    /// Build a filter from `filter_metadata`. Returns `None` when there is
    /// nothing to filter on.
    pub fn from_metadata(
        filter_metadata: Option<&Metadata>,
    ) -> Result<Option<MetadataFilter>, ValidationError> {
        let Some(filter_metadata) = filter_metadata else {
            return Ok(None);
        };
        if filter_metadata.is_empty() {
            return Ok(None);
        }

        let mut filter = MetadataFilter::default();
        for (key, value) in filter_metadata {
            filter = filter.and(key, value.clone())?;
        }

        Ok(Some(filter))
    }

    /// Add an equality condition. Only exact-match types are accepted.
    pub fn and(mut self, key: &str, value: Value) -> Result<Self, ValidationError> {
        let supported = match &value {
            Value::String(_) | Value::Bool(_) => true,
            Value::Number(n) => n.is_i64() || n.is_u64(),
            _ => false,
        };
        if !supported {
            return Err(ValidationError::field(
                format!("filter_metadata.{key}"),
                "only string, integer or boolean values can be matched",
            ));
        }

        self.must.push(FieldCondition {
            key: key.to_string(),
            value,
        });
        Ok(self)
    }

    pub fn to_store_filter(&self) -> Value {
        let must: Vec<Value> = self
            .must
            .iter()
            .map(|c| json!({"key": c.key, "match": {"value": c.value}}))
            .collect();
        json!({ "must": must })
    }

    /// A condition holds when the payload value equals it, or when the
    /// payload value is an array containing it.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| match payload.get(&c.key) {
            Some(Value::Array(items)) => items.contains(&c.value),
            Some(value) => value == &c.value,
            None => false,
        })
    }
}
