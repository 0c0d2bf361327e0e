//! On-disk container: one JSON document holding every retained record,
//! newest-inserted first, under a single `logs` field.

use logdock_core::model::log::LogRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct LogFile {
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Serialize)]
pub struct LogFileRef<'a> {
    pub logs: &'a [LogRecord],
}
