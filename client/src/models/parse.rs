//! Lenient field parsing at the backend boundary.
//!
//! The backend is not consistent about ids (numbers or strings), amounts
//! (numbers or numeric strings) or list shapes (bare arrays or wrapped in
//! `data`/`items`). Everything is normalised here once so that the rest of the
//! crate works with strict types.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Accept a string or a number and return it as a string. `null` becomes empty.
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Accept a number or numeric string. Anything else becomes `0.0`.
pub fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_f64(&Value::deserialize(deserializer)?).unwrap_or(0.0))
}

/// Accept a number or numeric string. Anything else becomes `0`.
pub fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_f64(&Value::deserialize(deserializer)?)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0))
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Strip a `{ "data": ... }` envelope if present.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("id") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Parse a single record, applying the envelope rules.
pub fn parse_record<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(unwrap_envelope(value))?)
}

/// Parse a list. Accepts a bare array, or an object wrapping it under `items`,
/// `data`, or `results`. Entries that fail to parse are skipped with a warning.
pub fn parse_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    let items = match unwrap_envelope(value) {
        Value::Array(items) => items,
        Value::Object(mut map) => match ["items", "results", "data"]
            .iter()
            .find_map(|key| map.remove(*key))
        {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ClientError::UnexpectedResponse(
                    "expected a list".to_string(),
                ))
            }
        },
        Value::Null => Vec::new(),
        _ => {
            return Err(ClientError::UnexpectedResponse(
                "expected a list".to_string(),
            ))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed list entry");
                None
            }
        })
        .collect())
}
