//! Session routes: logging, history, comparison, reports and the sag
//! calculator.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::{self, Comparison};
use crate::db;
use crate::history::{self, HistoryFilter, HistoryView};
use crate::report::SessionReport;
use crate::routes::auth::AuthUser;
use crate::routes::preferences::preferences_error_to_status;
use crate::routes::sync::deferred_response;
use crate::sag::{MeasurementChanges, SagMeasurements, SagReading};
use crate::services::preferences;
use crate::services::track_session::{self, SessionDetail, SessionInput};
use crate::state::AppState;

pub(crate) fn session_error_to_status(err: track_session::SessionError) -> StatusCode {
    match err {
        track_session::SessionError::NotFound(_) | track_session::SessionError::TrackDayNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        track_session::SessionError::NumberContention => StatusCode::CONFLICT,
        track_session::SessionError::Database(e) => {
            tracing::error!(error = %e, "session query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// `POST /api/sessions`: `201` with the numbered row, or `202` when the
/// database is unreachable and the write was queued.
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<SessionInput>,
) -> Result<Response, StatusCode> {
    let id = Uuid::new_v4();
    let rider_id = auth.rider.id;

    let specs = match preferences::field_specs(&state.pool, rider_id).await {
        Ok(specs) => specs,
        Err(preferences::PreferencesError::Database(e)) if db::is_unavailable(&e) => {
            tracing::warn!(error = %e, "database unreachable; queueing session");
            return deferred_response(&state, rider_id, id, "sessions", &input).await;
        }
        Err(e) => return Err(preferences_error_to_status(e)),
    };

    match track_session::create_session(&state.pool, rider_id, id, &input, &specs).await {
        Ok(row) => Ok((StatusCode::CREATED, Json(row)).into_response()),
        Err(track_session::SessionError::Database(e)) if db::is_unavailable(&e) => {
            tracing::warn!(error = %e, "database unreachable; queueing session");
            deferred_response(&state, rider_id, id, "sessions", &input).await
        }
        Err(e) => Err(session_error_to_status(e)),
    }
}

/// `GET /api/sessions/:id`: session with track-day and bike context.
pub async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, StatusCode> {
    let detail = track_session::get_session_detail(&state.pool, auth.rider.id, session_id)
        .await
        .map_err(session_error_to_status)?;
    Ok(Json(detail))
}

/// `DELETE /api/sessions/:id`
pub async fn delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    track_session::delete_session(&state.pool, auth.rider.id, session_id)
        .await
        .map_err(session_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// HISTORY / COMPARE / REPORT
// =============================================================================

/// `GET /api/sessions/history?search=&circuit=&bike=&sort=asc|desc`
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<HistoryView>, StatusCode> {
    let entries = track_session::list_history(&state.pool, auth.rider.id)
        .await
        .map_err(session_error_to_status)?;
    Ok(Json(history::build_view(entries, &filter)))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub a: Uuid,
    pub b: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    #[serde(flatten)]
    pub comparison: Comparison,
    pub changed_count: usize,
}

/// `GET /api/sessions/compare?a=&b=`: field-by-field diff, older first.
pub async fn compare_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, StatusCode> {
    let a = track_session::get_session(&state.pool, auth.rider.id, query.a)
        .await
        .map_err(session_error_to_status)?;
    let b = track_session::get_session(&state.pool, auth.rider.id, query.b)
        .await
        .map_err(session_error_to_status)?;

    let comparison = compare::compare(&a.to_compared(), &b.to_compared(), &compare::default_fields());
    let changed_count = comparison.changed_count();
    Ok(Json(CompareResponse { comparison, changed_count }))
}

/// `GET /api/sessions/:id/report`
pub async fn report_json(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionReport>, StatusCode> {
    let detail = track_session::get_session_detail(&state.pool, auth.rider.id, session_id)
        .await
        .map_err(session_error_to_status)?;
    Ok(Json(SessionReport::build(&detail)))
}

/// `GET /api/sessions/:id/report.csv`
pub async fn report_csv(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let detail = track_session::get_session_detail(&state.pool, auth.rider.id, session_id)
        .await
        .map_err(session_error_to_status)?;
    let report = SessionReport::build(&detail);
    let disposition = format!("attachment; filename=\"{}\"", report.file_name("csv"));

    Ok((
        [(CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()), (CONTENT_DISPOSITION, disposition)],
        report.to_csv(),
    )
        .into_response())
}

// =============================================================================
// SAG
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SagComponentBody {
    #[serde(flatten)]
    pub current: SagMeasurements,
    /// Previous session's lengths, for the "was X" markers.
    #[serde(default)]
    pub reference: Option<SagMeasurements>,
}

#[derive(Debug, Deserialize)]
pub struct SagBody {
    #[serde(default)]
    pub fork: Option<SagComponentBody>,
    #[serde(default)]
    pub shock: Option<SagComponentBody>,
}

#[derive(Debug, Serialize)]
pub struct SagComponentResponse {
    #[serde(flatten)]
    pub reading: SagReading,
    pub static_negative: bool,
    pub rider_negative: bool,
    pub changed: Option<MeasurementChanges>,
}

#[derive(Debug, Serialize)]
pub struct SagResponse {
    pub fork: Option<SagComponentResponse>,
    pub shock: Option<SagComponentResponse>,
}

pub(crate) fn sag_component(body: &SagComponentBody) -> SagComponentResponse {
    let reading = body.current.clamped().reading();
    SagComponentResponse {
        static_negative: reading.is_static_negative(),
        rider_negative: reading.is_rider_negative(),
        changed: body.reference.map(|r| reading.changed_from(&r)),
        reading,
    }
}

/// `POST /api/sag`: static and rider sag for fork and shock.
pub async fn calculate_sag(_auth: AuthUser, Json(body): Json<SagBody>) -> Json<SagResponse> {
    Json(SagResponse {
        fork: body.fork.as_ref().map(sag_component),
        shock: body.shock.as_ref().map(sag_component),
    })
}

#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;
