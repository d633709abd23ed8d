//! Runtime configuration from environment variables.
//!
//! `.env` is loaded by `main` before `Config::from_env` runs. Numeric values
//! that fail to parse fall back to their defaults instead of aborting
//! startup; only `DATABASE_URL` is required.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_OUTBOX_PATH: &str = "data/outbox.json";
const DEFAULT_OUTBOX_DRAIN_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Mail delivery settings for access codes.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Directory holding uploaded images, served under `/uploads`.
    pub upload_dir: PathBuf,
    /// JSON file backing the server-side offline write queue.
    pub outbox_path: PathBuf,
    pub outbox_drain_secs: u64,
    pub cookie_secure: bool,
    /// `None` logs access codes instead of mailing them.
    pub mail: Option<MailConfig>,
}

impl Config {
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let mail = match (std::env::var("RESEND_API_KEY"), std::env::var("RESEND_FROM")) {
            (Ok(api_key), Ok(from)) if !api_key.trim().is_empty() => Some(MailConfig { api_key, from }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            upload_dir: env_path("UPLOAD_DIR", DEFAULT_UPLOAD_DIR),
            outbox_path: env_path("OUTBOX_PATH", DEFAULT_OUTBOX_PATH),
            outbox_drain_secs: env_parse("OUTBOX_DRAIN_SECS", DEFAULT_OUTBOX_DRAIN_SECS).max(1),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            mail,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
