//! Preference routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::routes::auth::AuthUser;
use crate::services::preferences::{self, Preferences, PreferencesUpdate};
use crate::state::AppState;

pub(crate) fn preferences_error_to_status(err: preferences::PreferencesError) -> StatusCode {
    match err {
        preferences::PreferencesError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        preferences::PreferencesError::Database(e) => {
            tracing::error!(error = %e, "preferences query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/preferences`
pub async fn get_preferences(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Preferences>, StatusCode> {
    let prefs = preferences::get_preferences(&state.pool, auth.rider.id)
        .await
        .map_err(preferences_error_to_status)?;
    Ok(Json(prefs))
}

/// `PATCH /api/preferences`: omitted members keep their value.
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, StatusCode> {
    let prefs = preferences::update_preferences(&state.pool, auth.rider.id, &update)
        .await
        .map_err(preferences_error_to_status)?;
    Ok(Json(prefs))
}

#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;
