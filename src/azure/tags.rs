//! Tag conversion and limits.
//!
//! Declarations carry tags as a JSON object; ARM carries them as a
//! string-to-string map.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::schema::Diagnostic;

/// Maximum number of tags ARM accepts on a resource.
pub const MAX_TAGS: usize = 15;

/// Maximum tag key length.
pub const MAX_TAG_KEY_LEN: usize = 512;

/// Maximum tag value length.
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// Convert declared tags into the ARM representation.
///
/// Scalars are stringified; `null` or a missing value yields no tags.
pub fn expand_tags(value: Option<&Value>) -> Result<BTreeMap<String, String>, String> {
    let obj = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(obj)) => obj,
        Some(other) => return Err(format!("tags must be a map, got {}", other)),
    };

    obj.iter()
        .map(|(key, value)| Ok((key.clone(), tag_value_to_string(key, value)?)))
        .collect()
}

/// Convert ARM tags into the state representation. Missing tags become `{}`.
pub fn flatten_tags(tags: Option<&BTreeMap<String, String>>) -> Value {
    let map = tags
        .map(|tags| {
            tags.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(map)
}

/// Check declared tags against ARM limits.
pub fn validate_tags(value: Option<&Value>) -> Vec<Diagnostic> {
    let tags = match expand_tags(value) {
        Ok(tags) => tags,
        Err(e) => return vec![Diagnostic::error(e).with_attribute("tags")],
    };

    let mut diagnostics = Vec::new();
    if tags.len() > MAX_TAGS {
        diagnostics.push(
            Diagnostic::error(format!("a maximum of {} tags can be applied", MAX_TAGS))
                .with_detail(format!("got {} tags", tags.len()))
                .with_attribute("tags"),
        );
    }

    for (key, value) in &tags {
        if key.chars().count() > MAX_TAG_KEY_LEN {
            diagnostics.push(
                Diagnostic::error(format!(
                    "the maximum length for a tag key is {} characters",
                    MAX_TAG_KEY_LEN
                ))
                .with_detail(format!("tag key {:?} is too long", truncate(key)))
                .with_attribute(format!("tags.{}", key)),
            );
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            diagnostics.push(
                Diagnostic::error(format!(
                    "the maximum length for a tag value is {} characters",
                    MAX_TAG_VALUE_LEN
                ))
                .with_detail(format!("value of tag {:?} is too long", truncate(key)))
                .with_attribute(format!("tags.{}", key)),
            );
        }
    }

    diagnostics
}

fn tag_value_to_string(key: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("tag {:?} must be a scalar, got {}", key, other)),
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}
