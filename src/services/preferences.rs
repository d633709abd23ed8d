//! Rider preferences: clock format, unit system and setup field ranges.
//!
//! A rider without a stored row gets the defaults; the row is created on the
//! first save. Field overrides are stored as given and merged over the
//! default catalogue on read, so later catalogue additions show up for
//! everyone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::setup::{self, FieldSpec};

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("invalid preferences: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Clock used when showing session times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeFormat {
    #[serde(rename = "12h")]
    Twelve,
    #[default]
    #[serde(rename = "24h")]
    TwentyFour,
}

impl TimeFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twelve => "12h",
            Self::TwentyFour => "24h",
        }
    }

    /// Unknown stored values fall back to the default.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "12h" => Self::Twelve,
            _ => Self::TwentyFour,
        }
    }
}

/// Unit system preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "imperial" => Self::Imperial,
            _ => Self::Metric,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Preferences {
    pub time_format: TimeFormat,
    pub unit_system: UnitSystem,
    /// Effective field ranges: defaults with the rider's overrides applied.
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            time_format: TimeFormat::default(),
            unit_system: UnitSystem::default(),
            fields: setup::default_field_specs(),
        }
    }
}

/// Partial update. Omitted members keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub time_format: Option<TimeFormat>,
    #[serde(default)]
    pub unit_system: Option<UnitSystem>,
    #[serde(default)]
    pub fields: Option<BTreeMap<String, FieldSpec>>,
}

#[derive(sqlx::FromRow)]
struct PreferencesRow {
    time_format: String,
    unit_system: String,
    #[sqlx(json)]
    config: BTreeMap<String, FieldSpec>,
}

impl From<PreferencesRow> for Preferences {
    fn from(row: PreferencesRow) -> Self {
        Self {
            time_format: TimeFormat::parse(&row.time_format),
            unit_system: UnitSystem::parse(&row.unit_system),
            fields: setup::merge_field_specs(&row.config),
        }
    }
}

/// Load the rider's preferences, or the defaults when none are stored.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_preferences(pool: &PgPool, rider_id: Uuid) -> Result<Preferences, PreferencesError> {
    let row = sqlx::query_as::<_, PreferencesRow>(
        "SELECT time_format, unit_system, config FROM user_preferences WHERE rider_id = $1",
    )
    .bind(rider_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Preferences::from).unwrap_or_default())
}

/// Effective field ranges used to clamp submitted setups.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn field_specs(pool: &PgPool, rider_id: Uuid) -> Result<BTreeMap<String, FieldSpec>, PreferencesError> {
    Ok(get_preferences(pool, rider_id).await?.fields)
}

/// Apply a partial update and return the effective preferences.
///
/// # Errors
///
/// Returns `Invalid` when a field override has `min > max` or a
/// non-positive step.
pub async fn update_preferences(
    pool: &PgPool,
    rider_id: Uuid,
    update: &PreferencesUpdate,
) -> Result<Preferences, PreferencesError> {
    if let Some(fields) = &update.fields
        && fields.values().any(|spec| !(spec.min <= spec.max && spec.step > 0.0))
    {
        return Err(PreferencesError::Invalid("field ranges need min <= max and a positive step"));
    }

    let row = sqlx::query_as::<_, PreferencesRow>(
        r"INSERT INTO user_preferences (rider_id, time_format, unit_system, config)
          VALUES ($1, COALESCE($2, '24h'), COALESCE($3, 'metric'), COALESCE($4, '{}'::jsonb))
          ON CONFLICT (rider_id) DO UPDATE SET
              time_format = COALESCE($2, user_preferences.time_format),
              unit_system = COALESCE($3, user_preferences.unit_system),
              config = COALESCE($4, user_preferences.config),
              updated_at = now()
          RETURNING time_format, unit_system, config",
    )
    .bind(rider_id)
    .bind(update.time_format.map(TimeFormat::as_str))
    .bind(update.unit_system.map(UnitSystem::as_str))
    .bind(update.fields.as_ref().map(sqlx::types::Json))
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;
