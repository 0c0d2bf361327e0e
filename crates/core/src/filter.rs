use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::log::{LogLevel, LogRecord};
use crate::time::parse_time_str;

/// Flat, string-valued query parameters. Every field is optional and an
/// empty string counts as not supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LogCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(alias = "resource_id", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(alias = "trace_id", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(alias = "span_id", skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(alias = "timestamp_start", skip_serializing_if = "Option::is_none")]
    pub timestamp_start: Option<String>,
    #[serde(alias = "timestamp_end", skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<String>,
}

impl LogCriteria {
    pub fn compile(&self) -> CompiledCriteria {
        CompiledCriteria {
            level: active(&self.level).map(|l| l.parse::<LogLevel>().ok()),
            message: active(&self.message).map(|m| m.to_lowercase()),
            resource_id: active(&self.resource_id).map(str::to_string),
            trace_id: active(&self.trace_id).map(str::to_string),
            span_id: active(&self.span_id).map(str::to_string),
            commit: active(&self.commit).map(str::to_string),
            window: TimeWindow {
                since: active(&self.timestamp_start).and_then(parse_time_str),
                until: active(&self.timestamp_end).and_then(parse_time_str),
            },
        }
    }
}

fn active(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Inclusive on both ends.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(since) = self.since
            && ts < since
        {
            return false;
        }
        if let Some(until) = self.until
            && ts > until
        {
            return false;
        }
        true
    }
}

/// Criteria with bounds parsed and the message needle lowercased once.
///
/// An unparseable time bound is dropped here, so it never constrains.
/// A level outside the enumeration is kept as `Some(None)` and matches
/// nothing.
#[derive(Debug, Clone)]
pub struct CompiledCriteria {
    level: Option<Option<LogLevel>>,
    message: Option<String>,
    resource_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    commit: Option<String>,
    window: TimeWindow,
}

impl CompiledCriteria {
    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(level) = &self.level
            && *level != Some(record.level)
        {
            return false;
        }
        if let Some(needle) = &self.message
            && !record.message.to_lowercase().contains(needle.as_str())
        {
            return false;
        }
        if !exact(&self.resource_id, &record.resource_id)
            || !exact(&self.trace_id, &record.trace_id)
            || !exact(&self.span_id, &record.span_id)
            || !exact(&self.commit, &record.commit)
        {
            return false;
        }
        self.window.contains(record.timestamp)
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

fn exact(want: &Option<String>, have: &str) -> bool {
    want.as_deref().is_none_or(|w| w == have)
}
