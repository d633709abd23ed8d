//! Track days: one date at one circuit on one bike, grouping sessions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::form;
use crate::services::{bike, circuit};

#[derive(Debug, thiserror::Error)]
pub enum TrackDayError {
    #[error("track day not found: {0}")]
    NotFound(Uuid),
    #[error("invalid track day: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<circuit::CircuitError> for TrackDayError {
    fn from(err: circuit::CircuitError) -> Self {
        match err {
            circuit::CircuitError::NotFound(_) => Self::Invalid("unknown circuit"),
            circuit::CircuitError::Invalid(msg) => Self::Invalid(msg),
            circuit::CircuitError::Database(e) => Self::Database(e),
        }
    }
}

impl From<bike::BikeError> for TrackDayError {
    fn from(err: bike::BikeError) -> Self {
        match err {
            bike::BikeError::NotFound(_) => Self::Invalid("unknown bike"),
            bike::BikeError::Invalid(msg) => Self::Invalid(msg),
            bike::BikeError::Database(e) => Self::Database(e),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrackDayRow {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub bike_id: Option<Uuid>,
    pub circuit_id: Option<Uuid>,
    pub circuit_name: String,
    pub date: Date,
    pub rider_weight: Option<f64>,
    pub weather: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDayInput {
    pub date: Date,
    #[serde(default)]
    pub circuit_id: Option<Uuid>,
    #[serde(default)]
    pub circuit_name: Option<String>,
    /// Defaults to the rider's active bike.
    #[serde(default)]
    pub bike_id: Option<Uuid>,
    #[serde(default, deserialize_with = "form::loose_f64")]
    pub rider_weight: Option<f64>,
    #[serde(default)]
    pub weather: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BikeBrief {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionBrief {
    pub id: Uuid,
    pub name: String,
    pub session_number: i32,
    pub best_lap: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A track day with its bike and sessions, for the history screen.
#[derive(Debug, Clone, Serialize)]
pub struct TrackDaySummary {
    #[serde(flatten)]
    pub day: TrackDayRow,
    pub bike: Option<BikeBrief>,
    pub sessions: Vec<SessionBrief>,
}

const TRACK_DAY_COLUMNS: &str = "id, rider_id, bike_id, circuit_id, circuit_name, date, rider_weight, weather, created_at";

/// Create a track day under a caller-chosen id. Re-creating an existing id
/// returns the stored row.
///
/// # Errors
///
/// Returns `Invalid` when neither a known circuit nor a circuit name is
/// given, or when the bike is not the rider's.
pub async fn create_track_day(
    pool: &PgPool,
    rider_id: Uuid,
    track_day_id: Uuid,
    input: &TrackDayInput,
) -> Result<TrackDayRow, TrackDayError> {
    let circuit_name = match input.circuit_id {
        Some(circuit_id) => circuit::get_circuit(pool, rider_id, circuit_id).await?.name,
        None => form::non_blank(input.circuit_name.as_deref())
            .ok_or(TrackDayError::Invalid("circuit is required"))?
            .to_owned(),
    };

    let bike_id = match input.bike_id {
        Some(bike_id) => Some(bike::get_bike(pool, rider_id, bike_id).await?.id),
        None => bike::active_bike(pool, rider_id).await?.map(|b| b.id),
    };

    let inserted = sqlx::query_as::<_, TrackDayRow>(&format!(
        r"INSERT INTO track_days (id, rider_id, bike_id, circuit_id, circuit_name, date, rider_weight, weather)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
          ON CONFLICT (id) DO NOTHING
          RETURNING {TRACK_DAY_COLUMNS}"
    ))
    .bind(track_day_id)
    .bind(rider_id)
    .bind(bike_id)
    .bind(input.circuit_id)
    .bind(&circuit_name)
    .bind(input.date)
    .bind(input.rider_weight)
    .bind(form::non_blank(input.weather.as_deref()))
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => {
            info!(track_day_id = %row.id, %rider_id, circuit = %row.circuit_name, "track day created");
            Ok(row)
        }
        None => get_track_day(pool, rider_id, track_day_id).await,
    }
}

/// Fetch one track day.
///
/// # Errors
///
/// Returns `NotFound` if it is not the rider's.
pub async fn get_track_day(pool: &PgPool, rider_id: Uuid, track_day_id: Uuid) -> Result<TrackDayRow, TrackDayError> {
    sqlx::query_as::<_, TrackDayRow>(&format!(
        "SELECT {TRACK_DAY_COLUMNS} FROM track_days WHERE id = $1 AND rider_id = $2"
    ))
    .bind(track_day_id)
    .bind(rider_id)
    .fetch_optional(pool)
    .await?
    .ok_or(TrackDayError::NotFound(track_day_id))
}

/// All track days, most recent first, each with its sessions in running order.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_track_days(pool: &PgPool, rider_id: Uuid) -> Result<Vec<TrackDaySummary>, TrackDayError> {
    let days = sqlx::query_as::<_, TrackDayRow>(&format!(
        "SELECT {TRACK_DAY_COLUMNS} FROM track_days WHERE rider_id = $1 ORDER BY date DESC, created_at DESC"
    ))
    .bind(rider_id)
    .fetch_all(pool)
    .await?;

    let bikes = sqlx::query_as::<_, (Uuid, String, String, String)>(
        "SELECT id, brand, model, color FROM bikes WHERE rider_id = $1",
    )
    .bind(rider_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, brand, model, color)| (id, BikeBrief { id, brand, model, color }))
    .collect::<HashMap<_, _>>();

    let session_rows = sqlx::query_as::<_, (Uuid, Uuid, String, i32, Option<String>, OffsetDateTime)>(
        r"SELECT track_day_id, id, name, session_number, best_lap, created_at
          FROM sessions WHERE rider_id = $1
          ORDER BY track_day_id, session_number ASC",
    )
    .bind(rider_id)
    .fetch_all(pool)
    .await?;

    let mut sessions: HashMap<Uuid, Vec<SessionBrief>> = HashMap::new();
    for (track_day_id, id, name, session_number, best_lap, created_at) in session_rows {
        sessions
            .entry(track_day_id)
            .or_default()
            .push(SessionBrief { id, name, session_number, best_lap, created_at });
    }

    Ok(days
        .into_iter()
        .map(|day| TrackDaySummary {
            bike: day.bike_id.and_then(|id| bikes.get(&id).cloned()),
            sessions: sessions.remove(&day.id).unwrap_or_default(),
            day,
        })
        .collect())
}

/// Delete a track day and its sessions.
///
/// # Errors
///
/// Returns `NotFound` if it is not the rider's.
pub async fn delete_track_day(pool: &PgPool, rider_id: Uuid, track_day_id: Uuid) -> Result<(), TrackDayError> {
    let result = sqlx::query("DELETE FROM track_days WHERE id = $1 AND rider_id = $2")
        .bind(track_day_id)
        .bind(rider_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(TrackDayError::NotFound(track_day_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "track_day_test.rs"]
mod tests;
