//! Shared handling of raw image uploads.

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};

use crate::services::storage;
use crate::state::AppState;

pub(crate) fn storage_error_to_status(err: &storage::StorageError) -> StatusCode {
    match err {
        storage::StorageError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        storage::StorageError::Empty => StatusCode::BAD_REQUEST,
        storage::StorageError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        storage::StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Store the request body as an image and return its public URL.
pub(crate) async fn store_image(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<String, StatusCode> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    storage::save_image(&state.config.upload_dir, content_type, body)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "image upload rejected");
            storage_error_to_status(&e)
        })
}
