//! Email access-code sign-in.
//!
//! A rider requests a six-character code for an email address, receives it by
//! mail (or in the server log when no mail provider is configured) and trades
//! it for a session. Only a hash of the code is stored.

use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::config::MailConfig;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const ACCESS_CODE_TEMPLATE: &str = include_str!("../../templates/access_code.html");

#[derive(Debug, thiserror::Error)]
pub enum AccessCodeError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|c| CODE_ALPHABET.contains(&c)) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[must_use]
pub fn hash_access_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    crate::services::auth_session::bytes_to_hex(&digest)
}

/// Display name derived from the address until the rider sets one.
#[must_use]
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("rider")
        .to_owned()
}

/// Create the rider if needed and issue a fresh code, invalidating older ones.
///
/// # Errors
///
/// Returns an error for a malformed address or a database failure.
pub async fn request_access_code(pool: &PgPool, email: &str) -> Result<(String, String), AccessCodeError> {
    let normalized = normalize_email(email).ok_or(AccessCodeError::InvalidEmail)?;

    sqlx::query(
        r"INSERT INTO riders (email, name)
          VALUES ($1, $2)
          ON CONFLICT (email) DO NOTHING",
    )
    .bind(&normalized)
    .bind(name_from_email(&normalized))
    .execute(pool)
    .await?;

    sqlx::query("DELETE FROM access_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(&normalized)
        .execute(pool)
        .await?;

    let code = generate_access_code();
    sqlx::query("INSERT INTO access_codes (email, code_hash) VALUES ($1, $2)")
        .bind(&normalized)
        .bind(hash_access_code(&code))
        .execute(pool)
        .await?;

    Ok((normalized, code))
}

/// Consume a code and return the rider it signs in.
///
/// Wrong guesses count against the latest code; it is burned after
/// `MAX_FAILED_ATTEMPTS`.
///
/// # Errors
///
/// Returns `VerificationFailed` for a wrong, expired or consumed code.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, AccessCodeError> {
    let normalized_email = normalize_email(email).ok_or(AccessCodeError::InvalidEmail)?;
    let normalized_code = normalize_code(code).ok_or(AccessCodeError::InvalidCode)?;

    let consumed = sqlx::query(
        r"UPDATE access_codes
          SET consumed_at = now()
          WHERE id = (
              SELECT id FROM access_codes
              WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
              ORDER BY created_at DESC
              LIMIT 1
          )
          AND code_hash = $2
          RETURNING id",
    )
    .bind(&normalized_email)
    .bind(hash_access_code(&normalized_code))
    .fetch_optional(pool)
    .await?;

    if consumed.is_none() {
        sqlx::query(
            r"UPDATE access_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END
              WHERE id = (
                  SELECT id FROM access_codes
                  WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(&normalized_email)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(pool)
        .await?;
        return Err(AccessCodeError::VerificationFailed);
    }

    let row = sqlx::query("SELECT id FROM riders WHERE email = $1")
        .bind(&normalized_email)
        .fetch_optional(pool)
        .await?
        .ok_or(AccessCodeError::VerificationFailed)?;

    Ok(row.get("id"))
}

/// Mail the code, or log it when no provider is configured.
///
/// # Errors
///
/// Returns an error if the provider rejects the message.
pub async fn deliver_access_code(mail: Option<&MailConfig>, to_email: &str, code: &str) -> Result<(), AccessCodeError> {
    let Some(mail) = mail else {
        info!(email = %to_email, %code, "mail not configured; access code logged");
        return Ok(());
    };

    let resend = Resend::new(&mail.api_key);
    let html = render_access_code_template(to_email, code);
    let email = CreateEmailBaseOptions::new(&mail.from, [to_email], "Your Laplog access code").with_html(&html);
    resend
        .emails
        .send(email)
        .await
        .map_err(|e| AccessCodeError::EmailDelivery(e.to_string()))?;
    Ok(())
}

#[must_use]
pub fn render_access_code_template(email: &str, code: &str) -> String {
    ACCESS_CODE_TEMPLATE.replace("{{EMAIL}}", email).replace("{{CODE}}", code)
}

#[cfg(test)]
#[path = "access_code_test.rs"]
mod tests;
