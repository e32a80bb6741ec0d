use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::AttemptError;
use crate::models::LabelFields;

/// Strip markup artifacts vision models wrap around JSON replies.
///
/// Handles:
/// 1. Reasoning blocks (`<think>...</think>`)
/// 2. Code fences, with or without a `json` language tag, anywhere in the text
/// 3. Leading/trailing whitespace left behind
pub fn strip_code_fences(raw: &str) -> String {
    static THINK_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```(?i:json)?").expect("valid regex"));

    let text = THINK_BLOCK_RE.replace_all(raw.trim(), "");
    FENCE_RE.replace_all(&text, "").trim().to_string()
}

/// Parse a sanitized reply into label fields.
///
/// The reply must be a JSON object. `tracking_number` and `phone_number` are
/// optional (absent → `NONE`) but must be strings when present.
pub fn parse_label_payload(cleaned: &str) -> Result<LabelFields, AttemptError> {
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| AttemptError::JsonParsing(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(AttemptError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let tracking = string_field(&map, "tracking_number")?;
    let phone = string_field(&map, "phone_number")?;
    Ok(LabelFields::from_raw(tracking, phone))
}

fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, AttemptError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(AttemptError::MalformedPayload(format!(
            "`{key}` must be a string, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
