//! Outbox replay into Postgres.
//!
//! DESIGN
//! ======
//! `PgWriteSink` turns a queued write back into the matching service call.
//! The queue item id becomes the new row's primary key and is recorded in
//! `applied_writes`, so an item replayed twice (a device resending a batch,
//! or a drain interrupted after the insert) lands exactly once.
//!
//! Two replay paths share the sink:
//! - the background task drains the server's own file-backed outbox, which
//!   holds writes that arrived while the database was unreachable;
//! - `POST /api/sync` replays a batch a device queued while offline.
//!
//! ERROR HANDLING
//! ==============
//! Connection-level database failures map to `SinkError::Unavailable` so
//! the item is retried on the next pass. Payloads that do not decode, or
//! that reference records the rider does not own, are rejected and stay
//! queued as well; nothing is dropped silently.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db;
use crate::outbox::{DrainReport, MemoryQueueStore, Outbox, OutboxError, QueuedWrite, SinkError, WriteSink};
use crate::services::{bike, circuit, preferences, track_day, track_session};
use crate::state::AppState;

/// Tables a queued write may target.
pub const SYNC_TABLES: &[&str] = &["bikes", "circuits", "track_days", "sessions"];

// =============================================================================
// ERROR MAPPING
// =============================================================================

fn database_error(err: &sqlx::Error) -> SinkError {
    if db::is_unavailable(err) {
        SinkError::Unavailable(err.to_string())
    } else {
        SinkError::Rejected(err.to_string())
    }
}

impl From<bike::BikeError> for SinkError {
    fn from(err: bike::BikeError) -> Self {
        match err {
            bike::BikeError::Database(e) => database_error(&e),
            bike::BikeError::Invalid(msg) => Self::InvalidPayload(msg.to_owned()),
            bike::BikeError::NotFound(_) => Self::Rejected(err.to_string()),
        }
    }
}

impl From<circuit::CircuitError> for SinkError {
    fn from(err: circuit::CircuitError) -> Self {
        match err {
            circuit::CircuitError::Database(e) => database_error(&e),
            circuit::CircuitError::Invalid(msg) => Self::InvalidPayload(msg.to_owned()),
            circuit::CircuitError::NotFound(_) => Self::Rejected(err.to_string()),
        }
    }
}

impl From<track_day::TrackDayError> for SinkError {
    fn from(err: track_day::TrackDayError) -> Self {
        match err {
            track_day::TrackDayError::Database(e) => database_error(&e),
            track_day::TrackDayError::Invalid(msg) => Self::InvalidPayload(msg.to_owned()),
            track_day::TrackDayError::NotFound(_) => Self::Rejected(err.to_string()),
        }
    }
}

impl From<track_session::SessionError> for SinkError {
    fn from(err: track_session::SessionError) -> Self {
        match err {
            track_session::SessionError::Database(e) => database_error(&e),
            // Numbering contention is transient.
            track_session::SessionError::NumberContention => Self::Unavailable(err.to_string()),
            track_session::SessionError::NotFound(_) | track_session::SessionError::TrackDayNotFound(_) => {
                Self::Rejected(err.to_string())
            }
        }
    }
}

impl From<preferences::PreferencesError> for SinkError {
    fn from(err: preferences::PreferencesError) -> Self {
        match err {
            preferences::PreferencesError::Database(e) => database_error(&e),
            preferences::PreferencesError::Invalid(msg) => Self::Rejected(msg.to_owned()),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(write: &QueuedWrite) -> Result<T, SinkError> {
    serde_json::from_value(write.payload.clone()).map_err(|e| SinkError::InvalidPayload(e.to_string()))
}

// =============================================================================
// POSTGRES SINK
// =============================================================================

pub struct PgWriteSink {
    pool: PgPool,
}

impl PgWriteSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn already_applied(&self, write: &QueuedWrite) -> Result<bool, SinkError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM applied_writes WHERE id = $1 AND rider_id = $2)",
        )
        .bind(write.id)
        .bind(write.rider_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error(&e))
    }

    async fn mark_applied(&self, write: &QueuedWrite) -> Result<(), SinkError> {
        sqlx::query(
            "INSERT INTO applied_writes (id, rider_id, table_name) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(write.id)
        .bind(write.rider_id)
        .bind(&write.table)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error(&e))?;
        Ok(())
    }

    async fn apply(&self, write: &QueuedWrite) -> Result<(), SinkError> {
        let pool = &self.pool;
        match write.table.as_str() {
            "bikes" => {
                let input: bike::BikeInput = decode(write)?;
                bike::add_bike(pool, write.rider_id, write.id, &input).await?;
            }
            "circuits" => {
                let input: circuit::CircuitInput = decode(write)?;
                circuit::create_circuit(pool, write.rider_id, write.id, &input).await?;
            }
            "track_days" => {
                let input: track_day::TrackDayInput = decode(write)?;
                track_day::create_track_day(pool, write.rider_id, write.id, &input).await?;
            }
            "sessions" => {
                let input: track_session::SessionInput = decode(write)?;
                let specs = preferences::field_specs(pool, write.rider_id).await?;
                track_session::create_session(pool, write.rider_id, write.id, &input, &specs).await?;
            }
            other => return Err(SinkError::UnknownTable(other.to_owned())),
        }
        Ok(())
    }
}

#[async_trait]
impl WriteSink for PgWriteSink {
    async fn insert(&self, write: &QueuedWrite) -> Result<(), SinkError> {
        if !SYNC_TABLES.contains(&write.table.as_str()) {
            return Err(SinkError::UnknownTable(write.table.clone()));
        }
        if self.already_applied(write).await? {
            debug!(id = %write.id, "write already applied; skipping");
            return Ok(());
        }
        self.apply(write).await?;
        self.mark_applied(write).await
    }
}

// =============================================================================
// DEFERRED WRITES
// =============================================================================

/// Queue a create that could not reach the database. The id is reused as
/// the row id when the write is replayed.
///
/// # Errors
///
/// Returns an error if the payload cannot be encoded or the queue cannot be
/// persisted.
pub async fn defer_write<T: Serialize>(
    state: &AppState,
    rider_id: Uuid,
    id: Uuid,
    table: &str,
    input: &T,
) -> Result<Uuid, OutboxError> {
    let payload = serde_json::to_value(input)?;
    let queued = state.outbox.enqueue_with_id(id, rider_id, table, payload).await?;
    Ok(queued.id)
}

/// Replay a device's queued writes for `rider_id`.
///
/// Every item is attributed to the authenticated rider regardless of what
/// the device sent.
///
/// # Errors
///
/// Returns an error only if the request-scoped queue fails.
pub async fn replay_batch(
    sink: &dyn WriteSink,
    rider_id: Uuid,
    writes: Vec<QueuedWrite>,
) -> Result<DrainReport, OutboxError> {
    let items = writes
        .into_iter()
        .map(|write| QueuedWrite { rider_id, ..write })
        .collect::<Vec<_>>();
    let batch = items.len();
    let outbox = Outbox::new(MemoryQueueStore::with_items(items));
    let report = outbox.drain(sink).await?;
    info!(%rider_id, batch, succeeded = report.succeeded, failed = report.failed, "device batch replayed");
    Ok(report)
}

// =============================================================================
// BACKGROUND DRAIN
// =============================================================================

/// One drain pass of the server outbox. Skipped while the queue is empty or
/// the database does not answer.
pub async fn drain_server_outbox(state: &AppState, sink: &dyn WriteSink) -> Option<DrainReport> {
    match state.outbox.pending().await {
        Ok(items) if items.is_empty() => return None,
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "outbox read failed");
            return None;
        }
    }

    if !db::ping(&state.pool).await {
        debug!("database unreachable; outbox drain deferred");
        return None;
    }

    match state.outbox.drain(sink).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(error = %e, "outbox drain failed");
            None
        }
    }
}

/// Spawn the background outbox drain. The first pass runs immediately, so
/// writes queued before a restart are replayed at startup.
pub fn spawn_outbox_drain_task(state: AppState) -> JoinHandle<()> {
    let drain_secs = state.config.outbox_drain_secs;
    info!(drain_secs, "outbox drain configured");
    tokio::spawn(async move {
        let sink = PgWriteSink::new(state.pool.clone());
        let mut ticker = tokio::time::interval(Duration::from_secs(drain_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            drain_server_outbox(&state, &sink).await;
        }
    })
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
