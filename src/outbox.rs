//! Offline write queue.
//!
//! DESIGN
//! ======
//! Writes that could not reach the database are appended to an ordered list
//! persisted by a `QueueStore`. `drain` replays the list through a
//! `WriteSink` one item at a time, drops successes, keeps failures in their
//! original order and persists the remainder.
//!
//! A single async mutex covers both enqueue and drain, so overlapping drain
//! triggers run back to back and an enqueue never races the rewrite of the
//! list.
//!
//! ERROR HANDLING
//! ==============
//! A failed item stays queued indefinitely: no backoff, no retry cap, no
//! dead letter. Each item carries a unique id the sink uses as an
//! idempotency key, so replaying an item that already landed is harmless.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// One pending insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub table: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("queue storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("queue encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Rejected(#[from] SinkError),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Aggregate result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
    pub pending_ids: Vec<Uuid>,
}

// =============================================================================
// STORAGE / SINK SEAMS
// =============================================================================

/// Where the pending list lives between drains.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<QueuedWrite>, OutboxError>;
    async fn save(&self, items: &[QueuedWrite]) -> Result<(), OutboxError>;
}

/// Destination of replayed writes.
#[async_trait]
pub trait WriteSink: Send + Sync {
    async fn insert(&self, write: &QueuedWrite) -> Result<(), SinkError>;
}

/// JSON file on local storage. A missing file is an empty queue.
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> Result<Vec<QueuedWrite>, OutboxError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, items: &[QueuedWrite]) -> Result<(), OutboxError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = serde_json::to_vec(items)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-process list, used for request-scoped replays.
#[derive(Default)]
pub struct MemoryQueueStore {
    items: Mutex<Vec<QueuedWrite>>,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn with_items(items: Vec<QueuedWrite>) -> Self {
        Self { items: Mutex::new(items) }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<QueuedWrite>, OutboxError> {
        Ok(self.items.lock().await.clone())
    }

    async fn save(&self, items: &[QueuedWrite]) -> Result<(), OutboxError> {
        *self.items.lock().await = items.to_vec();
        Ok(())
    }
}

// =============================================================================
// OUTBOX
// =============================================================================

pub struct Outbox<S> {
    store: S,
    lock: Mutex<()>,
}

impl<S: QueueStore> Outbox<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store, lock: Mutex::new(()) }
    }

    /// Append one write. The caller should report it as queued, not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or persisted.
    pub async fn enqueue(
        &self,
        rider_id: Uuid,
        table: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedWrite, OutboxError> {
        self.enqueue_with_id(Uuid::new_v4(), rider_id, table, payload).await
    }

    /// Append one write under a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or persisted.
    pub async fn enqueue_with_id(
        &self,
        id: Uuid,
        rider_id: Uuid,
        table: &str,
        payload: serde_json::Value,
    ) -> Result<QueuedWrite, OutboxError> {
        let _guard = self.lock.lock().await;
        let mut items = self.store.load().await?;
        let write = QueuedWrite { id, rider_id, table: table.to_owned(), payload };
        items.push(write.clone());
        self.store.save(&items).await?;
        info!(id = %write.id, table = %write.table, pending = items.len(), "write queued");
        Ok(write)
    }

    /// Items currently waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub async fn pending(&self) -> Result<Vec<QueuedWrite>, OutboxError> {
        let _guard = self.lock.lock().await;
        self.store.load().await
    }

    /// Replay every queued write in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or the remainder cannot
    /// be persisted. Sink failures are counted, not returned.
    pub async fn drain(&self, sink: &dyn WriteSink) -> Result<DrainReport, OutboxError> {
        let _guard = self.lock.lock().await;
        let items = self.store.load().await?;
        if items.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut remaining = Vec::new();
        let mut succeeded = 0;
        for item in items {
            match sink.insert(&item).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!(id = %item.id, table = %item.table, error = %e, "queued write failed");
                    remaining.push(item);
                }
            }
        }

        self.store.save(&remaining).await?;
        let report = DrainReport {
            succeeded,
            failed: remaining.len(),
            pending_ids: remaining.iter().map(|item| item.id).collect(),
        };
        info!(succeeded = report.succeeded, failed = report.failed, "outbox drained");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "outbox_test.rs"]
mod tests;
