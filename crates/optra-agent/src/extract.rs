//! Tool-call extraction from raw chat responses.
//!
//! This is the single place that understands wire-shape variation. Models
//! and API layers disagree on where tool calls live (on the message or on
//! the response root), whether each entry nests a `function` object, and
//! whether `arguments` is a JSON object or a string of JSON. Everything
//! downstream sees only the canonical `ToolCall`.

use serde_json::{Map, Value};

use optra_models::chat::ToolCall;

/// Extract tool calls from a raw response. Never fails; malformed entries
/// are skipped with a warning.
pub fn extract_tool_calls(response: &Value) -> Vec<ToolCall> {
    // Message-level calls take priority; the response root is a fallback
    // some API layers use.
    let message_calls = response
        .get("message")
        .and_then(|m| m.get("tool_calls"))
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty());
    let root_calls = response
        .get("tool_calls")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty());

    let Some(entries) = message_calls.or(root_calls) else {
        return Vec::new();
    };

    entries.iter().filter_map(parse_entry).collect()
}

fn parse_entry(entry: &Value) -> Option<ToolCall> {
    // Nested {"function": {"name", "arguments"}} or flat {"name", "arguments"}.
    let function = entry.get("function").unwrap_or(entry);

    let Some(name) = function.get("name").and_then(Value::as_str) else {
        tracing::warn!(entry = %entry, "skipping tool call with no name");
        return None;
    };

    let arguments = match function.get("arguments") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => parse_argument_string(name, raw),
        _ => Map::new(),
    };

    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Some(ToolCall {
        id,
        name: name.to_string(),
        arguments,
    })
}

fn parse_argument_string(name: &str, raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(tool = name, value = %other, "tool arguments are not an object, ignoring");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(tool = name, error = %e, "unparseable tool arguments, using empty set");
            Map::new()
        }
    }
}
