//! JSON path resolution.
//!
//! Resolves dot-notation paths like "meta.is_training_required" to values in
//! JSON, and folds ordered lists of candidate paths into a single value.

use serde_json::Value;

/// Resolve a dot-notation path to a value in JSON.
///
/// # Examples
/// ```
/// use ifplens_core::extraction::resolve_json_path;
/// use serde_json::json;
/// let data = json!({"institute_address": {"pincode": "110001"}});
/// let value = resolve_json_path(&data, "institute_address.pincode");
/// assert_eq!(value, Some(&json!("110001")));
/// ```
pub fn resolve_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Evaluate `paths` in order and return the first converted value.
///
/// `convert` decides what counts as present: returning `None` moves on to the
/// next path.
pub fn first_of<'a, T>(
    data: &'a Value,
    paths: &[&str],
    convert: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| resolve_json_path(data, path))
        .find_map(convert)
}

/// Convert a JSON value to a non-empty, trimmed string.
///
/// Numbers are rendered (pincodes and IDs arrive as either). Null, empty
/// strings, booleans and containers count as absent.
pub fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Convert a JSON value to an epoch number if possible.
///
/// Numeric strings are accepted; anything non-finite is treated as absent.
pub fn value_to_epoch(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Convert a JSON value to a count if possible.
pub fn value_to_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a flag that upstream sends either as a boolean or as the strings
/// "true"/"false".
///
/// Returns `None` for anything else so a caller folding several paths can
/// tell "explicitly false" from "not a flag".
pub fn value_to_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// True only for boolean `true` or the string `"true"`.
pub fn value_is_true(value: &Value) -> bool {
    value_to_flag(value) == Some(true)
}
