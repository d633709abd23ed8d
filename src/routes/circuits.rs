//! Circuit catalogue routes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::uploads;
use crate::services::circuit::{self, CircuitInput, CircuitRow};
use crate::state::AppState;

pub(crate) fn circuit_error_to_status(err: circuit::CircuitError) -> StatusCode {
    match err {
        circuit::CircuitError::NotFound(_) => StatusCode::NOT_FOUND,
        circuit::CircuitError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        circuit::CircuitError::Database(e) => {
            tracing::error!(error = %e, "circuit query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/circuits`: favorites first.
pub async fn list_circuits(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CircuitRow>>, StatusCode> {
    let rows = circuit::list_circuits(&state.pool, auth.rider.id)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/circuits`
pub async fn create_circuit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CircuitInput>,
) -> Result<(StatusCode, Json<CircuitRow>), StatusCode> {
    let row = circuit::create_circuit(&state.pool, auth.rider.id, Uuid::new_v4(), &input)
        .await
        .map_err(circuit_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/circuits/:id`
pub async fn get_circuit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circuit_id): Path<Uuid>,
) -> Result<Json<CircuitRow>, StatusCode> {
    let row = circuit::get_circuit(&state.pool, auth.rider.id, circuit_id)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(row))
}

/// `PUT /api/circuits/:id`
pub async fn update_circuit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circuit_id): Path<Uuid>,
    Json(input): Json<CircuitInput>,
) -> Result<Json<CircuitRow>, StatusCode> {
    let row = circuit::update_circuit(&state.pool, auth.rider.id, circuit_id, &input)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/circuits/:id`
pub async fn delete_circuit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circuit_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    circuit::delete_circuit(&state.pool, auth.rider.id, circuit_id)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/circuits/:id/favorite`: flip the favorite flag.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circuit_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let is_favorite = circuit::toggle_favorite(&state.pool, auth.rider.id, circuit_id)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(serde_json::json!({ "is_favorite": is_favorite })))
}

/// `POST /api/circuits/import-famous`
pub async fn import_famous(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let added = circuit::import_famous_circuits(&state.pool, auth.rider.id)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(serde_json::json!({ "added": added })))
}

/// `PUT /api/circuits/:id/map`: raw image body.
pub async fn upload_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circuit_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CircuitRow>, StatusCode> {
    circuit::get_circuit(&state.pool, auth.rider.id, circuit_id)
        .await
        .map_err(circuit_error_to_status)?;
    let url = uploads::store_image(&state, &headers, &body).await?;
    let row = circuit::set_map_image(&state.pool, auth.rider.id, circuit_id, &url)
        .await
        .map_err(circuit_error_to_status)?;
    Ok(Json(row))
}

#[cfg(test)]
#[path = "circuits_test.rs"]
mod tests;
