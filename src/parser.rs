//! Recovery of extraction records from raw completion text.
//!
//! The completion service is an untrusted source. Its text is accepted only
//! if, after removing an optional code fence, it parses as a JSON array.
//! Anything else is a [`Error::MalformedResponse`].

use crate::{
    error::{Error, Result},
    record::{ExtractionRecord, UNKNOWN},
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

const OEM_KEYS: [&str; 3] = ["OEM", "oem", "Oem"];
const MODEL_KEYS: [&str; 3] = ["Model", "model", "MODEL"];

/// Returns the content of the first fenced code block, or the trimmed text
/// if there is no fence.
///
/// A block opened with "```json" takes precedence over a bare fence.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();

    let inner = if let Some((_, rest)) = text.split_once(JSON_FENCE) {
        rest.split(FENCE).next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once(FENCE) {
        rest.split(FENCE).next().unwrap_or(rest)
    } else {
        text
    };

    inner.trim()
}

/// Parses completion text into records.
///
/// Non-object array entries are dropped. Missing or falsy fields become
/// [`UNKNOWN`].
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the text is not valid JSON or the
/// top-level value is not an array.
pub fn parse_records(text: &str) -> Result<Vec<ExtractionRecord>> {
    let payload = strip_code_fence(text);

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::malformed(format!("not valid JSON: {e}")))?;

    let Value::Array(entries) = value else {
        return Err(Error::malformed(format!(
            "expected a JSON array, got {}",
            value_kind(&value)
        )));
    };

    let total = entries.len();
    let records: Vec<ExtractionRecord> = entries
        .iter()
        .filter_map(Value::as_object)
        .map(normalize)
        .collect();

    if records.len() < total {
        warn!(
            "Dropped {} non-object entries from completion response",
            total - records.len()
        );
    }
    debug!("Parsed {} records from completion response", records.len());

    Ok(records)
}

fn normalize(entry: &Map<String, Value>) -> ExtractionRecord {
    ExtractionRecord {
        oem: lookup(entry, &OEM_KEYS),
        model: lookup(entry, &MODEL_KEYS),
    }
}

/// First truthy value among `keys`, in order.
fn lookup(entry: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find_map(coerce)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Converts a JSON value to cell text, or `None` for falsy values.
fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
