use std::cmp::Reverse;

use logdock_core::filter::LogCriteria;
use logdock_core::model::log::LogRecord;
use logdock_core::query::QueryResponse;

use crate::Store;

impl Store {
    /// Runs `criteria` against the current snapshot. Never blocks on a
    /// write in progress.
    pub fn query_logs(&self, criteria: &LogCriteria) -> Vec<LogRecord> {
        let snapshot = self.load();
        query(&snapshot, criteria)
    }

    pub fn search(&self, criteria: &LogCriteria) -> QueryResponse {
        let records = self.query_logs(criteria);
        QueryResponse {
            total_matches: records.len(),
            records,
        }
    }
}

/// Filters with AND semantics and sorts by `timestamp` descending.
///
/// The sort is stable, so records sharing a timestamp stay newest-inserted
/// first.
pub fn query(records: &[LogRecord], criteria: &LogCriteria) -> Vec<LogRecord> {
    let compiled = criteria.compile();
    let mut out = records
        .iter()
        .filter(|r| compiled.matches(r))
        .cloned()
        .collect::<Vec<_>>();
    out.sort_by_key(|r| Reverse(r.timestamp));
    out
}
