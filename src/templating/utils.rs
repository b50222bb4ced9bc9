//! Utility functions for the templating system.

use serde_json::{Map, Value};

use super::context::RenderKey;

/// Perform a deep merge of two JSON values.
///
/// Recursively merges `overrides` into `base`. For objects, fields from `overrides`
/// are added or replace fields in `base`. For arrays and primitives, `overrides`
/// completely replaces `base`.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use reqrender::templating::deep_merge_json;
///
/// let base = json!({ "auth": { "user": "alice", "token": "a" } });
/// let overrides = json!({ "auth": { "token": "b" }, "host": "localhost" });
///
/// let result = deep_merge_json(base, &overrides);
/// assert_eq!(result, json!({ "auth": { "user": "alice", "token": "b" }, "host": "localhost" }));
/// ```
pub fn deep_merge_json(mut base: Value, overrides: &Value) -> Value {
    match (base.as_object_mut(), overrides.as_object()) {
        (Some(base_obj), Some(override_obj)) => {
            for (key, override_value) in override_obj {
                match base_obj.get_mut(key) {
                    Some(base_value) if base_value.is_object() && override_value.is_object() => {
                        let merged = deep_merge_json(base_value.take(), override_value);
                        base_obj.insert(key.clone(), merged);
                    }
                    _ => {
                        base_obj.insert(key.clone(), override_value.clone());
                    }
                }
            }
            base
        }
        (_, _) => overrides.clone(),
    }
}

/// Whether a string contains any template delimiter and needs rendering.
pub fn contains_template_syntax(value: &str) -> bool {
    value.contains("{{") || value.contains("{%") || value.contains("{#")
}

/// Flatten bindings into the names a template would use to reach each leaf.
///
/// Nested objects become dotted paths, array items get `[i]`, and keys that are
/// not plain identifiers use bracket syntax (`headers["X-Trace"]`). Top-level
/// keys that are not identifiers are reached through the `_` binding.
pub fn flatten_keys(bindings: &Map<String, Value>) -> Vec<RenderKey> {
    let mut keys = Vec::new();
    for (key, value) in bindings {
        if key == "_" {
            continue;
        }
        let name = if is_identifier(key) {
            key.clone()
        } else {
            format!("_[{}]", quote_key(key))
        };
        flatten_into(name, value, &mut keys);
    }
    keys
}

fn flatten_into(name: String, value: &Value, keys: &mut Vec<RenderKey>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let child_name = if is_identifier(key) {
                    format!("{name}.{key}")
                } else {
                    format!("{name}[{}]", quote_key(key))
                };
                flatten_into(child_name, child, keys);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(format!("{name}[{i}]"), item, keys);
            }
        }
        leaf => keys.push(RenderKey {
            name,
            value: leaf.clone(),
        }),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn quote_key(key: &str) -> String {
    format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
}
