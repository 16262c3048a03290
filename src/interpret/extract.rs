//! Intent parsing from free-form model output.
//!
//! Strategy: take the first brace-delimited object (`{...}` with no nested
//! braces) found in the text; if that does not parse, parse the whole text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::{AccessTier, Confidence, Intent};
use crate::error::{Result, UnlockError};

static FLAT_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[^}]+\}").ok());

/// First parseable JSON object in `text`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let embedded = FLAT_OBJECT
        .as_ref()
        .and_then(|re| re.find(text))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter(Value::is_object);

    embedded.or_else(|| serde_json::from_str::<Value>(text.trim()).ok().filter(Value::is_object))
}

fn episode_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Validate a decoded object into an `Intent`.
pub fn parse_intent(text: &str) -> Result<Intent> {
    let object = extract_json_object(text)
        .ok_or_else(|| UnlockError::MalformedResponse("No JSON object found in interpreter output".to_string()))?;

    let (Some(number), Some(access)) = (object.get("episode_number"), object.get("access_type")) else {
        return Err(UnlockError::MalformedResponse(
            "Invalid data structure. Missing episode_number or access_type.".to_string(),
        ));
    };

    let episode_number = episode_number(number)
        .ok_or_else(|| UnlockError::MalformedResponse(format!("episode_number is not an integer: {}", number)))?;

    let access_type = access
        .as_str()
        .and_then(|s| s.parse::<AccessTier>().ok())
        .ok_or_else(|| UnlockError::MalformedResponse("Invalid access type. Must be \"free\" or \"advance\".".to_string()))?;

    let confidence = object
        .get("confidence")
        .and_then(Value::as_str)
        .map(Confidence::parse)
        .unwrap_or_default();

    Ok(Intent {
        episode_number,
        access_type,
        confidence,
    })
}
