//! Track-day routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use uuid::Uuid;

use crate::db;
use crate::routes::auth::AuthUser;
use crate::routes::sync::deferred_response;
use crate::services::track_day::{self, TrackDayInput, TrackDayRow, TrackDaySummary};
use crate::services::track_session::{self, SessionDraft};
use crate::state::AppState;

pub(crate) fn track_day_error_to_status(err: track_day::TrackDayError) -> StatusCode {
    match err {
        track_day::TrackDayError::NotFound(_) => StatusCode::NOT_FOUND,
        track_day::TrackDayError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        track_day::TrackDayError::Database(e) => {
            tracing::error!(error = %e, "track day query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/track-days`: most recent first, with bike and sessions.
pub async fn list_track_days(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<TrackDaySummary>>, StatusCode> {
    let days = track_day::list_track_days(&state.pool, auth.rider.id)
        .await
        .map_err(track_day_error_to_status)?;
    Ok(Json(days))
}

/// `POST /api/track-days`: `201` with the row, or `202` when the database
/// is unreachable and the write was queued.
pub async fn create_track_day(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<TrackDayInput>,
) -> Result<Response, StatusCode> {
    let id = Uuid::new_v4();
    match track_day::create_track_day(&state.pool, auth.rider.id, id, &input).await {
        Ok(row) => Ok((StatusCode::CREATED, Json(row)).into_response()),
        Err(track_day::TrackDayError::Database(e)) if db::is_unavailable(&e) => {
            tracing::warn!(error = %e, "database unreachable; queueing track day");
            deferred_response(&state, auth.rider.id, id, "track_days", &input).await
        }
        Err(e) => Err(track_day_error_to_status(e)),
    }
}

/// `GET /api/track-days/:id`
pub async fn get_track_day(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(track_day_id): Path<Uuid>,
) -> Result<Json<TrackDayRow>, StatusCode> {
    let row = track_day::get_track_day(&state.pool, auth.rider.id, track_day_id)
        .await
        .map_err(track_day_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/track-days/:id`: removes its sessions too.
pub async fn delete_track_day(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(track_day_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    track_day::delete_track_day(&state.pool, auth.rider.id, track_day_id)
        .await
        .map_err(track_day_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/track-days/:id/draft`: next session prefilled with the
/// previous setup on the same bike.
pub async fn draft_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(track_day_id): Path<Uuid>,
) -> Result<Json<SessionDraft>, StatusCode> {
    let draft = track_session::draft_next_session(&state.pool, auth.rider.id, track_day_id)
        .await
        .map_err(crate::routes::sessions::session_error_to_status)?;
    Ok(Json(draft))
}

#[cfg(test)]
#[path = "track_days_test.rs"]
mod tests;
