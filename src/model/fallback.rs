//! Recovery of tool calls that a model wrote into its text instead of the
//! structured field, framed as `<tool_call>{"name": .., "arguments": ..}</tool_call>`.

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::ToolCallRequest;

const OPEN_TAG: &str = "<tool_call>";
const CLOSE_TAG: &str = "</tool_call>";

/// Split `text` into the prose around tagged blocks and the calls inside
/// them. Blocks that hold no usable call stay in the text unchanged.
pub fn lift_tagged_calls(text: &str) -> (String, Vec<ToolCallRequest>) {
    let mut text_parts = Vec::new();
    let mut calls = Vec::new();
    let mut remaining = text;

    while let Some(start) = remaining.find(OPEN_TAG) {
        let after_open = &remaining[start + OPEN_TAG.len()..];
        let Some(close_idx) = after_open.find(CLOSE_TAG) else {
            break;
        };

        let before = remaining[..start].trim();
        if !before.is_empty() {
            text_parts.push(before.to_string());
        }

        let inner = &after_open[..close_idx];
        let mut lifted = 0;
        for value in extract_json_values(inner) {
            if let Some((name, arguments)) = parse_call_value(&value) {
                let id = format!("call_{}", calls.len() + 1);
                calls.push(ToolCallRequest::new(id, name, arguments));
                lifted += 1;
            }
        }

        let block_end = start + OPEN_TAG.len() + close_idx + CLOSE_TAG.len();
        if lifted == 0 {
            debug!("keeping unparseable tool_call block as text");
            text_parts.push(remaining[start..block_end].trim().to_string());
        }

        remaining = &remaining[block_end..];
    }

    let rest = remaining.trim();
    if !rest.is_empty() {
        text_parts.push(rest.to_string());
    }

    (text_parts.join("\n"), calls)
}

fn parse_call_value(value: &Value) -> Option<(String, Map<String, Value>)> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match value.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw).ok()? {
            Value::Object(map) => map,
            _ => return None,
        },
        Some(_) => return None,
    };

    Some((name.to_string(), arguments))
}

/// Every balanced top-level `{...}` in `text` that parses as JSON.
fn extract_json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escape_next => escape_next = false,
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(value) = serde_json::from_str::<Value>(&text[s..=i]) {
                            values.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    values
}
