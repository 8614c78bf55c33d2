use serde_json::Value;

use crate::codec::first_present;

/// Key carried by a call result when the contract rejected the call.
pub const ERROR_MARKER: &str = "errmsg";

fn entry_value(entry: &Value) -> Value {
    first_present(entry, &["result", "value"])
        .unwrap_or(entry)
        .clone()
}

/// Normalizes a `calls` result into `(call, value)` pairs in response order.
///
/// Arrays are keyed by `call`/`method`/`name`, falling back to the call that
/// was requested at the same position.
pub fn collect_calls(calls_result: &Value, requested: &[String]) -> Vec<(String, Value)> {
    match calls_result {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let key = first_present(item, &["call", "method", "name"])
                    .and_then(Value::as_str)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .or_else(|| requested.get(index).cloned())?;
                Some((key, entry_value(item)))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, entry)| (key.clone(), entry_value(entry)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Value of the first call whose name starts with `prefix`.
pub fn extract_call_value(calls_result: &Value, prefix: &str, requested: &[String]) -> Option<Value> {
    collect_calls(calls_result, requested)
        .into_iter()
        .find(|(key, _)| key.starts_with(prefix))
        .map(|(_, value)| value)
}

pub fn extract_field_value(fields_result: &Value, field: &str) -> Option<Value> {
    match fields_result {
        Value::Array(items) => items
            .iter()
            .find(|item| {
                first_present(item, &["name", "field", "key"]).and_then(Value::as_str) == Some(field)
            })
            .map(entry_value),
        Value::Object(map) => map.get(field).map(entry_value),
        _ => None,
    }
}

/// Returns the `calls` map of a state payload wherever the backend placed it.
pub fn calls_section(state: &Value) -> &Value {
    section(state, "calls")
}

pub fn fields_section(state: &Value) -> &Value {
    section(state, "fields")
}

fn section<'a>(state: &'a Value, name: &str) -> &'a Value {
    first_present(state, &[name])
        .or_else(|| state.get("data").and_then(|data| first_present(data, &[name])))
        .or_else(|| state.get("result").and_then(|result| first_present(result, &[name])))
        .unwrap_or(&Value::Null)
}

pub fn has_error_marker(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.contains_key(ERROR_MARKER))
}
