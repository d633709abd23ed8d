//! Garage routes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::uploads;
use crate::services::bike::{self, BikeInput, BikeRow};
use crate::state::AppState;

pub(crate) fn bike_error_to_status(err: bike::BikeError) -> StatusCode {
    match err {
        bike::BikeError::NotFound(_) => StatusCode::NOT_FOUND,
        bike::BikeError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        bike::BikeError::Database(e) => {
            tracing::error!(error = %e, "bike query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/bikes`: the rider's garage, active bike first.
pub async fn list_bikes(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<BikeRow>>, StatusCode> {
    let rows = bike::list_bikes(&state.pool, auth.rider.id).await.map_err(bike_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/bikes`: add a bike.
pub async fn add_bike(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<BikeInput>,
) -> Result<(StatusCode, Json<BikeRow>), StatusCode> {
    let row = bike::add_bike(&state.pool, auth.rider.id, Uuid::new_v4(), &input)
        .await
        .map_err(bike_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/bikes/:id`
pub async fn get_bike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bike_id): Path<Uuid>,
) -> Result<Json<BikeRow>, StatusCode> {
    let row = bike::get_bike(&state.pool, auth.rider.id, bike_id).await.map_err(bike_error_to_status)?;
    Ok(Json(row))
}

/// `PUT /api/bikes/:id`
pub async fn update_bike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bike_id): Path<Uuid>,
    Json(input): Json<BikeInput>,
) -> Result<Json<BikeRow>, StatusCode> {
    let row = bike::update_bike(&state.pool, auth.rider.id, bike_id, &input)
        .await
        .map_err(bike_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/bikes/:id`
pub async fn delete_bike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bike_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    bike::delete_bike(&state.pool, auth.rider.id, bike_id).await.map_err(bike_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/bikes/:id/activate`: make this the rider's active bike.
pub async fn activate_bike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bike_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    bike::set_active_bike(&state.pool, auth.rider.id, bike_id).await.map_err(bike_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/bikes/:id/image`: raw image body.
pub async fn upload_bike_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bike_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BikeRow>, StatusCode> {
    // Ownership first, so strangers cannot fill the upload directory.
    bike::get_bike(&state.pool, auth.rider.id, bike_id).await.map_err(bike_error_to_status)?;
    let url = uploads::store_image(&state, &headers, &body).await?;
    let row = bike::set_bike_image(&state.pool, auth.rider.id, bike_id, &url)
        .await
        .map_err(bike_error_to_status)?;
    Ok(Json(row))
}

#[cfg(test)]
#[path = "bikes_test.rs"]
mod tests;
