//! Flat, size-checked metadata for vector stores

use crate::models::ChunkMetadata;
use codechunk_config::DedupConfig;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Fields removed by [`FlatMetadata::shrink_to_fit`], lowest value first.
/// An entry ending in `_` removes every field with that prefix.
const LOW_VALUE_FIELDS: &[&str] = &[
    "extra_",
    "unit_members",
    "section",
    "fallback_reason",
    "near_duplicate_of",
    "unit_parent",
    "hash_simhash",
    "hash_hash_time_ms",
    "commit_hash",
    "branch",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlatValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

/// Serialized size of flattened metadata against the configured cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetadataValidation {
    pub valid: bool,
    pub size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FlattenLimits {
    pub max_bytes: usize,
    pub max_list_len: usize,
    pub max_string_len: usize,
}

impl From<&DedupConfig> for FlattenLimits {
    fn from(config: &DedupConfig) -> Self {
        Self {
            max_bytes: config.max_metadata_bytes,
            max_list_len: config.max_list_len,
            max_string_len: config.max_string_len,
        }
    }
}

/// Key to primitive (or list of strings) map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatMetadata {
    fields: BTreeMap<String, FlatValue>,
}

impl FlatMetadata {
    /// Flatten `metadata`: nested keys joined with `_`, nulls dropped, lists
    /// of primitives kept as string lists, other lists JSON-encoded
    pub fn flatten(metadata: &ChunkMetadata, limits: &FlattenLimits) -> (Self, MetadataValidation) {
        let value = match serde_json::to_value(metadata) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %metadata.source_path, error = %e, "failed to serialize chunk metadata");
                Value::Null
            }
        };
        let mut flat = Self::default();
        flat.walk(String::new(), &value, limits);
        let validation = flat.validate(limits.max_bytes);
        (flat, validation)
    }

    fn walk(&mut self, prefix: String, value: &Value, limits: &FlattenLimits) {
        let flat = match value {
            Value::Null => return,
            Value::Object(map) => {
                for (key, inner) in map {
                    let key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}_{key}")
                    };
                    self.walk(key, inner, limits);
                }
                return;
            }
            Value::Array(items) if items.is_empty() => return,
            Value::Array(items) if items.iter().all(is_primitive) => FlatValue::List(
                items
                    .iter()
                    .take(limits.max_list_len)
                    .map(|v| truncate(primitive_string(v), limits.max_string_len))
                    .collect(),
            ),
            Value::Array(_) => FlatValue::Str(truncate(value.to_string(), limits.max_string_len)),
            Value::Bool(b) => FlatValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FlatValue::Int(i),
                None => FlatValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FlatValue::Str(truncate(s.clone(), limits.max_string_len)),
        };
        self.fields.insert(prefix, flat);
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlatValue)> {
        self.fields.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, FlatValue> {
        self.fields
    }

    /// JSON byte size
    pub fn size(&self) -> usize {
        serde_json::to_vec(&self.fields).map_or(usize::MAX, |bytes| bytes.len())
    }

    pub fn validate(&self, max_bytes: usize) -> MetadataValidation {
        let size = self.size();
        MetadataValidation {
            valid: size <= max_bytes,
            size,
        }
    }

    /// Drop low-value fields in a fixed order until the size is within `max_bytes`
    pub fn shrink_to_fit(&mut self, max_bytes: usize) -> MetadataValidation {
        let mut validation = self.validate(max_bytes);
        for field in LOW_VALUE_FIELDS {
            if validation.valid {
                break;
            }
            match field.strip_suffix('_') {
                Some(prefix) => self
                    .fields
                    .retain(|key, _| !key.starts_with(prefix) || !key[prefix.len()..].starts_with('_')),
                None => {
                    self.fields.remove(*field);
                }
            }
            validation = self.validate(max_bytes);
        }
        validation
    }
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn primitive_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(mut s: String, max_chars: usize) -> String {
    if let Some((byte, _)) = s.char_indices().nth(max_chars) {
        s.truncate(byte);
    }
    s
}
