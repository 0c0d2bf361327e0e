use serde::{Deserialize, Serialize};

use crate::model::log::LogRecord;

/// Pushed to live subscribers; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LiveEvent {
    #[serde(rename_all = "camelCase")]
    LogIngested {
        record: LogRecord,
        total_count: usize,
    },
}
