//! Schema check for inbound records. Pure: no I/O, no clock.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::log::{LogDraft, LogLevel};
use crate::time::parse_timestamp;

/// Every caller-supplied field, in schema order.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "level",
    "message",
    "resourceId",
    "timestamp",
    "traceId",
    "spanId",
    "commit",
    "metadata",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid level: {0} (expected one of error, warn, info, debug)")]
    InvalidLevel(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid metadata: expected an object")]
    InvalidMetadata,

    #[error("invalid {0}: expected a string")]
    InvalidField(&'static str),
}

/// Checks a candidate and returns the normalized draft.
///
/// Order of checks: missing/falsy fields, level, timestamp, metadata shape.
/// The first failing check is reported.
pub fn validate(candidate: &Value) -> Result<LogDraft, ValidationError> {
    let empty = Map::new();
    let obj = candidate.as_object().unwrap_or(&empty);

    let missing = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| obj.get(*field).is_none_or(is_falsy))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let level = match &obj["level"] {
        Value::String(s) => s
            .parse::<LogLevel>()
            .map_err(|_| ValidationError::InvalidLevel(s.clone()))?,
        other => return Err(ValidationError::InvalidLevel(other.to_string())),
    };

    let raw_ts = &obj["timestamp"];
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
        ValidationError::InvalidTimestamp(match raw_ts {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })?;

    let Value::Object(metadata) = &obj["metadata"] else {
        return Err(ValidationError::InvalidMetadata);
    };

    Ok(LogDraft {
        level,
        message: text_field(obj, "message")?,
        resource_id: text_field(obj, "resourceId")?,
        timestamp,
        trace_id: text_field(obj, "traceId")?,
        span_id: text_field(obj, "spanId")?,
        commit: text_field(obj, "commit")?,
        metadata: metadata.clone(),
    })
}

/// `null`, `false`, `0` and `""` count as absent.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Numbers and `true` are kept in their JSON text form; containers are rejected.
fn text_field(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match &obj[field] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ValidationError::InvalidField(field)),
    }
}
