//! Track sessions: numbered runs within a track day, each with a setup snapshot.
//!
//! DESIGN
//! ======
//! `session_number` is assigned inside the INSERT as `MAX + 1` for the track
//! day. A unique `(track_day_id, session_number)` constraint turns a
//! concurrent insert into a conflict, which is retried a bounded number of
//! times with a fresh number.
//!
//! A new session starts from the previous session's setup on the same bike
//! (the "draft"); the rider only edits what changed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::compare::ComparedSession;
use crate::db;
use crate::form;
use crate::laptime;
use crate::setup::{FieldSpec, Setup};

const SESSION_NUMBER_CONSTRAINT: &str = "sessions_track_day_id_session_number_key";
const MAX_NUMBER_RETRIES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("track day not found: {0}")]
    TrackDayNotFound(Uuid),
    #[error("could not assign a session number")]
    NumberContention,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub track_day_id: Uuid,
    pub session_number: i32,
    pub name: String,
    #[sqlx(json)]
    pub setup: Setup,
    pub notes: Option<String>,
    pub best_lap: Option<String>,
    pub lap_times: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl SessionRow {
    #[must_use]
    pub fn to_compared(&self) -> ComparedSession {
        ComparedSession {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            fields: self.setup.to_field_map(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInput {
    pub track_day_id: Uuid,
    /// Defaults to `"Session {n}"`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub setup: Setup,
    #[serde(default)]
    pub notes: Option<String>,
    /// Derived from `lap_times` when omitted.
    #[serde(default)]
    pub best_lap: Option<String>,
    #[serde(default)]
    pub lap_times: Vec<String>,
}

impl SessionInput {
    /// Best lap as given, else the fastest parsable lap time.
    #[must_use]
    pub fn resolved_best_lap(&self) -> Option<String> {
        form::non_blank(self.best_lap.as_deref())
            .map(str::to_owned)
            .or_else(|| laptime::fastest(self.lap_times.iter().map(String::as_str)).map(laptime::format_millis))
    }

    #[must_use]
    pub fn cleaned_lap_times(&self) -> Vec<String> {
        self.lap_times
            .iter()
            .filter_map(|t| form::non_blank(Some(t)).map(str::to_owned))
            .collect()
    }
}

/// Track-day context shown alongside a session and in its report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionContext {
    pub date: Date,
    pub circuit_name: String,
    pub rider_weight: Option<f64>,
    pub bike_brand: Option<String>,
    pub bike_model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRow,
    pub track_day: SessionContext,
}

/// Starting point for the next session of a track day.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDraft {
    pub track_day_id: Uuid,
    pub session_number: i32,
    pub name: String,
    /// Session the setup was copied from, if any.
    pub inherited_from: Option<Uuid>,
    pub setup: Setup,
}

/// One row of the history listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub name: String,
    pub session_number: i32,
    pub best_lap: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub track_day_id: Uuid,
    pub date: Date,
    pub circuit_name: String,
    pub bike_brand: Option<String>,
    pub bike_model: Option<String>,
    pub bike_color: Option<String>,
}

impl HistoryEntry {
    #[must_use]
    pub fn bike_label(&self) -> Option<String> {
        match (&self.bike_brand, &self.bike_model) {
            (Some(brand), Some(model)) => Some(format!("{brand} {model}")),
            _ => None,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, rider_id, track_day_id, session_number, name, setup, notes, best_lap, lap_times, created_at";

/// Create a session under a caller-chosen id, numbering it after the
/// existing sessions of its track day. Re-creating an existing id returns
/// the stored row.
///
/// Numeric setup values are clamped into `specs`.
///
/// # Errors
///
/// Returns `TrackDayNotFound` if the track day is not the rider's.
pub async fn create_session(
    pool: &PgPool,
    rider_id: Uuid,
    session_id: Uuid,
    input: &SessionInput,
    specs: &BTreeMap<String, FieldSpec>,
) -> Result<SessionRow, SessionError> {
    let setup = input.setup.clone().clamped(specs);
    let name = form::non_blank(input.name.as_deref());
    let best_lap = input.resolved_best_lap();
    let lap_times = input.cleaned_lap_times();
    let notes = form::non_blank(input.notes.as_deref());

    for attempt in 0..MAX_NUMBER_RETRIES {
        let result = sqlx::query_as::<_, SessionRow>(&format!(
            r"WITH next AS (
                  SELECT td.id AS track_day_id,
                         COALESCE((SELECT MAX(s.session_number) FROM sessions s WHERE s.track_day_id = td.id), 0) + 1 AS n
                  FROM track_days td
                  WHERE td.id = $3 AND td.rider_id = $2
              )
              INSERT INTO sessions (id, rider_id, track_day_id, session_number, name, setup, notes, best_lap, lap_times)
              SELECT $1, $2, next.track_day_id, next.n, COALESCE($4, 'Session ' || next.n), $5, $6, $7, $8
              FROM next
              ON CONFLICT (id) DO NOTHING
              RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(rider_id)
        .bind(input.track_day_id)
        .bind(name)
        .bind(sqlx::types::Json(&setup))
        .bind(notes)
        .bind(best_lap.as_deref())
        .bind(&lap_times)
        .fetch_optional(pool)
        .await;

        match result {
            Ok(Some(row)) => {
                info!(session_id = %row.id, track_day_id = %row.track_day_id, number = row.session_number, "session created");
                return Ok(row);
            }
            Ok(None) => {
                return match get_session(pool, rider_id, session_id).await {
                    Ok(existing) => Ok(existing),
                    Err(SessionError::NotFound(_)) => Err(SessionError::TrackDayNotFound(input.track_day_id)),
                    Err(e) => Err(e),
                };
            }
            Err(e) if db::is_unique_violation(&e, SESSION_NUMBER_CONSTRAINT) => {
                warn!(attempt, track_day_id = %input.track_day_id, "session number taken; retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(SessionError::NumberContention)
}

/// Fetch one session.
///
/// # Errors
///
/// Returns `NotFound` if it is not the rider's.
pub async fn get_session(pool: &PgPool, rider_id: Uuid, session_id: Uuid) -> Result<SessionRow, SessionError> {
    sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND rider_id = $2"
    ))
    .bind(session_id)
    .bind(rider_id)
    .fetch_optional(pool)
    .await?
    .ok_or(SessionError::NotFound(session_id))
}

/// Fetch a session with its track-day and bike context.
///
/// # Errors
///
/// Returns `NotFound` if it is not the rider's.
pub async fn get_session_detail(pool: &PgPool, rider_id: Uuid, session_id: Uuid) -> Result<SessionDetail, SessionError> {
    let session = get_session(pool, rider_id, session_id).await?;
    let track_day = sqlx::query_as::<_, SessionContext>(
        r"SELECT td.date, td.circuit_name, td.rider_weight, b.brand AS bike_brand, b.model AS bike_model
          FROM track_days td
          LEFT JOIN bikes b ON b.id = td.bike_id
          WHERE td.id = $1",
    )
    .bind(session.track_day_id)
    .fetch_optional(pool)
    .await?
    .ok_or(SessionError::NotFound(session_id))?;

    Ok(SessionDetail { session, track_day })
}

/// Delete a session. Later sessions keep their numbers.
///
/// # Errors
///
/// Returns `NotFound` if it is not the rider's.
pub async fn delete_session(pool: &PgPool, rider_id: Uuid, session_id: Uuid) -> Result<(), SessionError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND rider_id = $2")
        .bind(session_id)
        .bind(rider_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SessionError::NotFound(session_id));
    }
    Ok(())
}

/// Most recent session ridden on `bike_id` (or on any bike when `None`).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn latest_session(
    pool: &PgPool,
    rider_id: Uuid,
    bike_id: Option<Uuid>,
) -> Result<Option<SessionRow>, SessionError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        r"SELECT {SESSION_COLUMNS} FROM sessions
          WHERE rider_id = $1
            AND ($2::uuid IS NULL OR track_day_id IN (SELECT id FROM track_days WHERE bike_id = $2))
          ORDER BY created_at DESC
          LIMIT 1"
    ))
    .bind(rider_id)
    .bind(bike_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Build the next session of a track day from the previous setup on its bike.
///
/// # Errors
///
/// Returns `TrackDayNotFound` if the track day is not the rider's.
pub async fn draft_next_session(pool: &PgPool, rider_id: Uuid, track_day_id: Uuid) -> Result<SessionDraft, SessionError> {
    let (bike_id, next_number) = sqlx::query_as::<_, (Option<Uuid>, i32)>(
        r"SELECT td.bike_id,
                 COALESCE((SELECT MAX(s.session_number) FROM sessions s WHERE s.track_day_id = td.id), 0) + 1
          FROM track_days td
          WHERE td.id = $1 AND td.rider_id = $2",
    )
    .bind(track_day_id)
    .bind(rider_id)
    .fetch_optional(pool)
    .await?
    .ok_or(SessionError::TrackDayNotFound(track_day_id))?;

    let previous = latest_session(pool, rider_id, bike_id).await?;
    Ok(build_draft(track_day_id, next_number, previous.as_ref()))
}

/// Inherit the previous setup; name, notes and laps start empty.
#[must_use]
pub fn build_draft(track_day_id: Uuid, session_number: i32, previous: Option<&SessionRow>) -> SessionDraft {
    SessionDraft {
        track_day_id,
        session_number,
        name: format!("Session {session_number}"),
        inherited_from: previous.map(|p| p.id),
        setup: previous.map(|p| p.setup.inherit()).unwrap_or_default(),
    }
}

/// Every session of the rider with its track-day and bike context.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_history(pool: &PgPool, rider_id: Uuid) -> Result<Vec<HistoryEntry>, SessionError> {
    let rows = sqlx::query_as::<_, HistoryEntry>(
        r"SELECT s.id, s.name, s.session_number, s.best_lap, s.created_at,
                 td.id AS track_day_id, td.date, td.circuit_name,
                 b.brand AS bike_brand, b.model AS bike_model, b.color AS bike_color
          FROM sessions s
          JOIN track_days td ON td.id = s.track_day_id
          LEFT JOIN bikes b ON b.id = td.bike_id
          WHERE s.rider_id = $1
          ORDER BY s.created_at DESC",
    )
    .bind(rider_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
#[path = "track_session_test.rs"]
mod tests;
