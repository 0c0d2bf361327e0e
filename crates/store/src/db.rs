use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use logdock_core::error::Result;
use logdock_core::model::log::LogRecord;
use logdock_core::query::StatusResponse;
use tracing::{debug, info};

use crate::backend::{Backend, JsonFileBackend, MemoryBackend};
use crate::retention::enforce_cap;

/// The retained log collection.
///
/// Readers get an immutable snapshot (`Arc<Vec<_>>`) and never wait on a
/// write in progress. Writers hold `writer` across the whole
/// read-modify-save span and publish the new snapshot only after the
/// backend has saved it.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Box<dyn Backend>,
    retention_cap: usize,
    snapshot: RwLock<Arc<Vec<LogRecord>>>,
    writer: Mutex<()>,
}

impl Store {
    pub fn open(path: &Path, retention_cap: usize) -> Result<Self> {
        let backend = JsonFileBackend::new(path)?;
        Self::with_backend(Box::new(backend), retention_cap)
    }

    pub fn open_in_memory(retention_cap: usize) -> Result<Self> {
        Self::with_backend(Box::<MemoryBackend>::default(), retention_cap)
    }

    /// Loads whatever the backend holds. A backend with no data is
    /// initialized to an empty collection and saved right away.
    pub fn with_backend(backend: Box<dyn Backend>, retention_cap: usize) -> Result<Self> {
        let retention_cap = retention_cap.max(1);
        let records = match backend.load()? {
            Some(mut records) => {
                let evicted = enforce_cap(&mut records, retention_cap);
                if evicted > 0 {
                    backend.save(&records)?;
                    info!(evicted, retention_cap, "truncated stored logs to retention cap");
                }
                records
            }
            None => {
                backend.save(&[])?;
                debug!(location = %backend.describe(), "initialized empty log store");
                Vec::new()
            }
        };

        info!(
            location = %backend.describe(),
            count = records.len(),
            "log store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                backend,
                retention_cap,
                snapshot: RwLock::new(Arc::new(records)),
                writer: Mutex::new(()),
            }),
        })
    }

    /// Point-in-time view of every retained record, newest-inserted first.
    pub fn load(&self) -> Arc<Vec<LogRecord>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    pub fn retention_cap(&self) -> usize {
        self.inner.retention_cap
    }

    pub fn location(&self) -> String {
        self.inner.backend.describe()
    }

    pub fn status(&self) -> StatusResponse {
        let records = self.load();
        let oldest_ts = records.iter().map(|r| r.timestamp).min();
        let newest_ts = records.iter().map(|r| r.timestamp).max();

        StatusResponse {
            data_path: self.location(),
            data_size_bytes: self.inner.backend.size_bytes(),
            logs_count: records.len(),
            retention_cap: self.inner.retention_cap,
            oldest_ts,
            newest_ts,
            subscribers: 0,
        }
    }

    pub(crate) fn writer(&self) -> MutexGuard<'_, ()> {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    pub(crate) fn publish_snapshot(&self, records: Vec<LogRecord>) {
        let mut slot = self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(records);
    }
}
