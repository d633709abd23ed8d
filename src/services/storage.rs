//! Image storage: uploaded bike photos and circuit maps.
//!
//! Files land in the upload directory under a fresh random name and are
//! served read-only at `/uploads/<file>`. Only the URL is stored on the
//! owning record.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Public prefix the upload directory is mounted at.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("image is empty")]
    Empty,
    #[error("image exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// File extension for an accepted image content type.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Write `bytes` to `dir` and return the public URL.
///
/// # Errors
///
/// Returns `UnsupportedType`, `Empty` or `TooLarge` for rejected uploads and
/// `Io` when the file cannot be written.
pub async fn save_image(dir: &Path, content_type: &str, bytes: &[u8]) -> Result<String, StorageError> {
    let ext = extension_for(content_type).ok_or_else(|| StorageError::UnsupportedType(content_type.to_owned()))?;
    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge);
    }

    tokio::fs::create_dir_all(dir).await?;
    let file_name = format!("{}.{ext}", Uuid::new_v4());
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    info!(file = %file_name, size = bytes.len(), "image stored");
    Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
