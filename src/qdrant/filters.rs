//! Equality-conjunction filter construction for Qdrant queries.

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Compose a Qdrant filter requiring every supplied field to match exactly.
///
/// Returns `None` when no usable condition remains, so callers can omit the
/// filter clause entirely. String values are trimmed; empty strings are
/// dropped rather than matched.
pub fn build_equality_filter(conditions: &BTreeMap<String, Value>) -> Option<Value> {
    let must: Vec<Value> = conditions
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    Value::String(trimmed.to_string())
                }
                Value::Null => return None,
                other => other.clone(),
            };
            Some(json!({
                "key": key,
                "match": { "value": value }
            }))
        })
        .collect();

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Shorthand for a single-field equality filter.
pub(crate) fn field_equals(field: &str, value: Value) -> BTreeMap<String, Value> {
    let mut conditions = BTreeMap::new();
    conditions.insert(field.to_string(), value);
    conditions
}
