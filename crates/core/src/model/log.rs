use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LogdockError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [Self::Error, Self::Warn, Self::Info, Self::Debug];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact, case-sensitive: `"ERROR"` is not a level.
impl FromStr for LogLevel {
    type Err = LogdockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(LogdockError::Parse(format!("unknown level: {s}"))),
        }
    }
}

/// A stored log entry. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    pub commit: String,
    pub metadata: Map<String, Value>,
    pub ingested_at: DateTime<Utc>,
}

/// A validated candidate that has not been assigned an identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDraft {
    pub level: LogLevel,
    pub message: String,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    pub commit: String,
    pub metadata: Map<String, Value>,
}

impl LogDraft {
    pub fn into_record(self, id: String, ingested_at: DateTime<Utc>) -> LogRecord {
        LogRecord {
            id,
            level: self.level,
            message: self.message,
            resource_id: self.resource_id,
            timestamp: self.timestamp,
            trace_id: self.trace_id,
            span_id: self.span_id,
            commit: self.commit,
            metadata: self.metadata,
            ingested_at,
        }
    }
}
