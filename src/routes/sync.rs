//! Offline replay routes and the shared "queued" response.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outbox::{OutboxError, QueuedWrite};
use crate::routes::auth::AuthUser;
use crate::services::sync::{self, PgWriteSink};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    pub writes: Vec<QueuedWrite>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub pending_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
    pub id: Uuid,
}

pub(crate) fn outbox_error_to_status(err: &OutboxError) -> StatusCode {
    match err {
        OutboxError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OutboxError::Io(_) | OutboxError::Encoding(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Queue a create in the server outbox and answer `202 Accepted`.
pub(crate) async fn deferred_response<T: Serialize>(
    state: &AppState,
    rider_id: Uuid,
    id: Uuid,
    table: &str,
    input: &T,
) -> Result<Response, StatusCode> {
    let id = sync::defer_write(state, rider_id, id, table, input).await.map_err(|e| {
        tracing::error!(error = %e, "outbox enqueue failed");
        outbox_error_to_status(&e)
    })?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true, id })).into_response())
}

/// `POST /api/sync`: replay writes a device queued while offline.
pub async fn sync_writes(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SyncBody>,
) -> Result<Json<SyncResponse>, StatusCode> {
    let sink = PgWriteSink::new(state.pool.clone());
    let report = sync::replay_batch(&sink, auth.rider.id, body.writes).await.map_err(|e| {
        tracing::error!(error = %e, "device batch replay failed");
        outbox_error_to_status(&e)
    })?;
    Ok(Json(SyncResponse { succeeded: report.succeeded, failed: report.failed, pending_ids: report.pending_ids }))
}

/// `GET /api/sync/pending`: number of writes waiting in the server outbox.
pub async fn pending_writes(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let pending = state.outbox.pending().await.map_err(|e| {
        tracing::error!(error = %e, "outbox read failed");
        outbox_error_to_status(&e)
    })?;
    Ok(Json(serde_json::json!({ "pending": pending.len() })))
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
