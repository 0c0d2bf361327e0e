use logdock_core::error::Result;
use logdock_core::model::log::LogRecord;
use tracing::debug;

use crate::Store;
use crate::retention::enforce_cap;

impl Store {
    /// Prepends `record`, trims to the retention cap and saves the whole
    /// collection. Returns the new total.
    ///
    /// If the save fails nothing is committed: readers keep the previous
    /// snapshot and the error is returned.
    pub fn append(&self, record: LogRecord) -> Result<usize> {
        let _writer = self.writer();
        let current = self.load();

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(record);
        next.extend(current.iter().cloned());
        let evicted = enforce_cap(&mut next, self.retention_cap());

        self.backend().save(&next)?;

        let total = next.len();
        self.publish_snapshot(next);
        if evicted > 0 {
            debug!(evicted, total, "retention cap evicted oldest inserted logs");
        }
        Ok(total)
    }

    /// Empties the collection and saves the empty state.
    pub fn reset(&self) -> Result<()> {
        let _writer = self.writer();
        self.backend().save(&[])?;
        self.publish_snapshot(Vec::new());
        Ok(())
    }
}
