//! Cookie session tokens.
//!
//! A successful sign-in creates a random 32-byte token stored in
//! `auth_sessions`; every authenticated request resolves it back to a rider.
//!
//! Tokens that validated recently are remembered in a [`SessionCache`], so a
//! signed-in rider can still queue writes while the database is unreachable.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Mutex;

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Rider resolved from a session token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRider {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A validated token: the rider plus the moment the token stops being valid.
#[derive(Debug, Clone)]
pub struct ValidSession {
    pub rider: SessionRider,
    pub expires_at: OffsetDateTime,
}

/// Create a session for the given rider, returning the token.
pub async fn create_session(pool: &PgPool, rider_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO auth_sessions (token, rider_id) VALUES ($1, $2)")
        .bind(&token)
        .bind(rider_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated rider.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<ValidSession>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT r.id, r.email, r.name, r.avatar_url, s.expires_at
          FROM auth_sessions s
          JOIN riders r ON r.id = s.rider_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ValidSession {
        rider: SessionRider {
            id: r.get("id"),
            email: r.get("email"),
            name: r.get("name"),
            avatar_url: r.get("avatar_url"),
        },
        expires_at: r.get("expires_at"),
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Update the rider's display name and avatar.
pub async fn update_profile(
    pool: &PgPool,
    rider_id: Uuid,
    name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"UPDATE riders
          SET name = COALESCE($2, name),
              avatar_url = COALESCE($3, avatar_url)
          WHERE id = $1",
    )
    .bind(rider_id)
    .bind(name)
    .bind(avatar_url)
    .execute(pool)
    .await?;
    Ok(())
}

// =============================================================================
// SESSION CACHE
// =============================================================================

/// Tokens seen valid by the database, consulted only when it cannot be reached.
#[derive(Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, ValidSession>>,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, token: &str, session: ValidSession) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(token.to_owned(), session);
    }

    pub fn forget(&self, token: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(token);
    }

    /// Rider for `token` if it was validated before and has not expired by `now`.
    /// Expired entries are dropped on the way.
    #[must_use]
    pub fn lookup(&self, token: &str, now: OffsetDateTime) -> Option<SessionRider> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(token) {
            Some(session) if session.expires_at > now => Some(session.rider.clone()),
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
#[path = "auth_session_test.rs"]
mod tests;
