use logdock_core::model::log::LogRecord;

/// Keeps the first `cap` records (the newest-inserted) and drops the rest.
/// Returns how many were evicted. Timestamps play no part.
pub fn enforce_cap(records: &mut Vec<LogRecord>, cap: usize) -> usize {
    let evicted = records.len().saturating_sub(cap);
    records.truncate(cap);
    evicted
}
