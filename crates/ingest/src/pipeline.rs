use chrono::Utc;
use logdock_core::error::LogdockError;
use logdock_core::ids::new_record_id;
use logdock_core::model::event::LiveEvent;
use logdock_core::model::log::{LogDraft, LogRecord};
use logdock_core::validate::{ValidationError, validate};
use logdock_store::Store;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::broadcast::Broadcaster;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The caller's record failed validation. Nothing was written.
    #[error("{0}")]
    Rejected(#[from] ValidationError),

    /// The store could not save. Nothing was committed or broadcast.
    #[error("persistence failed: {0}")]
    Failed(LogdockError),

    #[error("ingest pipeline is closed")]
    Closed,
}

enum Command {
    Append {
        draft: LogDraft,
        reply: oneshot::Sender<Result<LogRecord, LogdockError>>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), LogdockError>>,
    },
}

/// The single writer of the store.
///
/// Handles are cheap to clone; every clone feeds the same writer task, so
/// appends and resets run one at a time in arrival order.
#[derive(Clone)]
pub struct Pipeline {
    tx: mpsc::Sender<Command>,
}

pub struct PipelineConfig {
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl Pipeline {
    pub fn new(store: Store, broadcaster: Broadcaster, cfg: PipelineConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.channel_capacity.max(1));
        tokio::spawn(run_writer(store, broadcaster, rx));
        Self { tx }
    }

    /// Validate, assign identity, persist, then notify subscribers.
    pub async fn ingest(&self, candidate: &Value) -> Result<LogRecord, IngestError> {
        let draft = validate(candidate)?;

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Append { draft, reply })
            .await
            .map_err(|_| IngestError::Closed)?;
        rx.await
            .map_err(|_| IngestError::Closed)?
            .map_err(IngestError::Failed)
    }

    pub async fn reset(&self) -> Result<(), IngestError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Reset { reply })
            .await
            .map_err(|_| IngestError::Closed)?;
        rx.await
            .map_err(|_| IngestError::Closed)?
            .map_err(IngestError::Failed)
    }
}

async fn run_writer(store: Store, broadcaster: Broadcaster, mut rx: mpsc::Receiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Append { draft, reply } => {
                let result = append(&store, &broadcaster, draft).await;
                let _ = reply.send(result);
            }
            Command::Reset { reply } => {
                let store = store.clone();
                let result = tokio::task::spawn_blocking(move || store.reset())
                    .await
                    .unwrap_or_else(|e| {
                        Err(LogdockError::Internal(format!("reset task failed: {e}")))
                    });
                match &result {
                    Ok(()) => debug!("log store reset"),
                    Err(e) => warn!(error = ?e, "failed to reset log store"),
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!("ingest writer stopped: all pipeline handles dropped");
}

async fn append(
    store: &Store,
    broadcaster: &Broadcaster,
    draft: LogDraft,
) -> Result<LogRecord, LogdockError> {
    let record = draft.into_record(new_record_id(), Utc::now());

    let total = {
        let store = store.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.append(record))
            .await
            .map_err(|e| LogdockError::Internal(format!("append task failed: {e}")))?
    }
    .inspect_err(|e| warn!(error = ?e, id = %record.id, "failed to persist log record"))?;

    let delivered = broadcaster.publish(LiveEvent::LogIngested {
        record: record.clone(),
        total_count: total,
    });
    debug!(id = %record.id, total, delivered, "log record ingested");
    Ok(record)
}
