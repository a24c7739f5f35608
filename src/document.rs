//! JSON documents.
//!
//! Collection properties, pipeline stages, hook args and change events are all
//! plain JSON objects. Keys may be addressed with dotted paths
//! (`fullDocument.status`).

use serde_json::Value;

/// A JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Looks up a dotted path inside a JSON value.
///
/// Array segments may be addressed by index (`items.0.sku`).
#[must_use]
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns the first object key starting with `$` found anywhere inside `value`.
#[must_use]
pub fn find_operator_key(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            if k.starts_with('$') {
                Some(k.as_str())
            } else {
                find_operator_key(v)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_operator_key),
        _ => None,
    }
}
