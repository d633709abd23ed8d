//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API under `/api`, uploaded images under `/uploads` and a liveness
//! probe at `/healthz`, all on one Axum router. Every `/api` handler except
//! the sign-in pair takes an `AuthUser`, which scopes its queries to the
//! signed-in rider.

pub mod auth;
pub mod bikes;
pub mod circuits;
pub mod preferences;
pub mod sessions;
pub mod sync;
pub mod track_days;
mod uploads;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::storage::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Image uploads carry raw bytes; leave headroom over the storage cap so the
/// service, not the extractor, reports oversized files.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024;

fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bikes/{id}/image", put(bikes::upload_bike_image))
        .route("/api/circuits/{id}/map", put(circuits::upload_map))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/request-code", post(auth::request_code))
        .route("/api/auth/verify-code", post(auth::verify_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/profile", put(auth::update_profile))
        .route("/api/bikes", get(bikes::list_bikes).post(bikes::add_bike))
        .route(
            "/api/bikes/{id}",
            get(bikes::get_bike).put(bikes::update_bike).delete(bikes::delete_bike),
        )
        .route("/api/bikes/{id}/activate", post(bikes::activate_bike))
        .route("/api/circuits", get(circuits::list_circuits).post(circuits::create_circuit))
        .route("/api/circuits/import-famous", post(circuits::import_famous))
        .route(
            "/api/circuits/{id}",
            get(circuits::get_circuit)
                .put(circuits::update_circuit)
                .delete(circuits::delete_circuit),
        )
        .route("/api/circuits/{id}/favorite", post(circuits::toggle_favorite))
        .route(
            "/api/track-days",
            get(track_days::list_track_days).post(track_days::create_track_day),
        )
        .route(
            "/api/track-days/{id}",
            get(track_days::get_track_day).delete(track_days::delete_track_day),
        )
        .route("/api/track-days/{id}/draft", get(track_days::draft_session))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/history", get(sessions::history))
        .route("/api/sessions/compare", get(sessions::compare_sessions))
        .route(
            "/api/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/{id}/report", get(sessions::report_json))
        .route("/api/sessions/{id}/report.csv", get(sessions::report_csv))
        .route("/api/sag", post(sessions::calculate_sag))
        .route(
            "/api/preferences",
            get(preferences::get_preferences).patch(preferences::update_preferences),
        )
        .route("/api/sync", post(sync::sync_writes))
        .route("/api/sync/pending", get(sync::pending_writes))
}

/// The full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .merge(api_routes())
        .merge(upload_routes())
        .route("/healthz", get(healthz))
        .nest_service("/uploads", uploads)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
