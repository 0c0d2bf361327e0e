use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::{LogdockError, Result};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a caller-supplied point in time.
///
/// Accepts RFC 3339 (any offset, normalized to UTC), RFC 2822, zone-less
/// date-times and bare dates (read as UTC), and numbers as milliseconds
/// since the Unix epoch.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_time_str(s),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

pub fn parse_time_str(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(input) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Some(ts) = parse_time_str(input) {
        return Ok(ts);
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        let delta = chrono::Duration::from_std(duration).map_err(|e| {
            LogdockError::Parse(format!("failed to parse duration to chrono: {e}"))
        })?;
        return Utc::now()
            .checked_sub_signed(delta)
            .ok_or_else(|| LogdockError::Parse(format!("duration {input} reaches out of range")));
    }

    Err(LogdockError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}
