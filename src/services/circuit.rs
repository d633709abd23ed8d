//! Circuit catalogue: the rider's tracks, favorites and the famous-circuit import.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::form;

#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    #[error("circuit not found: {0}")]
    NotFound(Uuid),
    #[error("invalid circuit: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CircuitRow {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub length_meters: Option<i32>,
    pub best_lap: Option<String>,
    pub gearing: Option<String>,
    pub notes: Option<String>,
    pub map_image_url: Option<String>,
    pub is_favorite: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitInput {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "form::loose_i32")]
    pub length_meters: Option<i32>,
    #[serde(default)]
    pub best_lap: Option<String>,
    #[serde(default)]
    pub gearing: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub map_image_url: Option<String>,
}

impl CircuitInput {
    fn validate(&self) -> Result<(), CircuitError> {
        if self.name.trim().is_empty() {
            return Err(CircuitError::Invalid("name is required"));
        }
        Ok(())
    }
}

/// Well-known Italian circuits offered as a one-click import.
pub const FAMOUS_CIRCUITS: &[(&str, &str, i32)] = &[
    ("Mugello Circuit", "Scarperia e San Piero, FI", 5245),
    ("Misano World Circuit", "Misano Adriatico, RN", 4226),
    ("Autodromo di Imola", "Imola, BO", 4909),
    ("Autodromo di Monza", "Monza, MB", 5793),
    ("Vallelunga", "Campagnano di Roma, RM", 4085),
    ("Cremona Circuit", "San Martino del Lago, CR", 3702),
    ("Autodromo del Levante", "Binetto, BA", 1577),
    ("Tazio Nuvolari", "Cervesina, PV", 2805),
    ("Autodromo dell'Umbria", "Magione, PG", 2507),
    ("Autodromo di Modena", "Modena, MO", 2007),
];

const CIRCUIT_COLUMNS: &str =
    "id, rider_id, name, location, length_meters, best_lap, gearing, notes, map_image_url, is_favorite, created_at";

/// List the rider's circuits, favorites first, then by name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_circuits(pool: &PgPool, rider_id: Uuid) -> Result<Vec<CircuitRow>, CircuitError> {
    let rows = sqlx::query_as::<_, CircuitRow>(&format!(
        "SELECT {CIRCUIT_COLUMNS} FROM circuits WHERE rider_id = $1 ORDER BY is_favorite DESC, lower(name) ASC"
    ))
    .bind(rider_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch one circuit.
///
/// # Errors
///
/// Returns `NotFound` if the circuit is not the rider's.
pub async fn get_circuit(pool: &PgPool, rider_id: Uuid, circuit_id: Uuid) -> Result<CircuitRow, CircuitError> {
    sqlx::query_as::<_, CircuitRow>(&format!(
        "SELECT {CIRCUIT_COLUMNS} FROM circuits WHERE id = $1 AND rider_id = $2"
    ))
    .bind(circuit_id)
    .bind(rider_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CircuitError::NotFound(circuit_id))
}

/// Create a circuit under a caller-chosen id. Re-adding an existing id
/// returns the stored row.
///
/// # Errors
///
/// Returns `Invalid` when the name is blank.
pub async fn create_circuit(
    pool: &PgPool,
    rider_id: Uuid,
    circuit_id: Uuid,
    input: &CircuitInput,
) -> Result<CircuitRow, CircuitError> {
    input.validate()?;

    let inserted = sqlx::query_as::<_, CircuitRow>(&format!(
        r"INSERT INTO circuits (id, rider_id, name, location, length_meters, best_lap, gearing, notes, map_image_url)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
          ON CONFLICT (id) DO NOTHING
          RETURNING {CIRCUIT_COLUMNS}"
    ))
    .bind(circuit_id)
    .bind(rider_id)
    .bind(input.name.trim())
    .bind(form::non_blank(input.location.as_deref()))
    .bind(input.length_meters)
    .bind(form::non_blank(input.best_lap.as_deref()))
    .bind(form::non_blank(input.gearing.as_deref()))
    .bind(form::non_blank(input.notes.as_deref()))
    .bind(form::non_blank(input.map_image_url.as_deref()))
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => Ok(row),
        None => get_circuit(pool, rider_id, circuit_id).await,
    }
}

/// Replace a circuit's details.
///
/// # Errors
///
/// Returns `NotFound` if the circuit is not the rider's.
pub async fn update_circuit(
    pool: &PgPool,
    rider_id: Uuid,
    circuit_id: Uuid,
    input: &CircuitInput,
) -> Result<CircuitRow, CircuitError> {
    input.validate()?;

    sqlx::query_as::<_, CircuitRow>(&format!(
        r"UPDATE circuits
          SET name = $3, location = $4, length_meters = $5, best_lap = $6, gearing = $7, notes = $8,
              map_image_url = COALESCE($9, map_image_url)
          WHERE id = $1 AND rider_id = $2
          RETURNING {CIRCUIT_COLUMNS}"
    ))
    .bind(circuit_id)
    .bind(rider_id)
    .bind(input.name.trim())
    .bind(form::non_blank(input.location.as_deref()))
    .bind(input.length_meters)
    .bind(form::non_blank(input.best_lap.as_deref()))
    .bind(form::non_blank(input.gearing.as_deref()))
    .bind(form::non_blank(input.notes.as_deref()))
    .bind(form::non_blank(input.map_image_url.as_deref()))
    .fetch_optional(pool)
    .await?
    .ok_or(CircuitError::NotFound(circuit_id))
}

/// Flip the favorite flag and return the new value.
///
/// # Errors
///
/// Returns `NotFound` if the circuit is not the rider's.
pub async fn toggle_favorite(pool: &PgPool, rider_id: Uuid, circuit_id: Uuid) -> Result<bool, CircuitError> {
    sqlx::query_scalar::<_, bool>(
        "UPDATE circuits SET is_favorite = NOT is_favorite WHERE id = $1 AND rider_id = $2 RETURNING is_favorite",
    )
    .bind(circuit_id)
    .bind(rider_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CircuitError::NotFound(circuit_id))
}

/// Delete a circuit. Track days keep their copied circuit name.
///
/// # Errors
///
/// Returns `NotFound` if the circuit is not the rider's.
pub async fn delete_circuit(pool: &PgPool, rider_id: Uuid, circuit_id: Uuid) -> Result<(), CircuitError> {
    let result = sqlx::query("DELETE FROM circuits WHERE id = $1 AND rider_id = $2")
        .bind(circuit_id)
        .bind(rider_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CircuitError::NotFound(circuit_id));
    }
    Ok(())
}

/// Add each famous circuit the rider does not already have (by name,
/// case-insensitive). Returns how many were added.
///
/// # Errors
///
/// Returns a database error if an insert fails.
pub async fn import_famous_circuits(pool: &PgPool, rider_id: Uuid) -> Result<u64, CircuitError> {
    let mut added = 0;
    for &(name, location, length) in FAMOUS_CIRCUITS {
        let result = sqlx::query(
            r"INSERT INTO circuits (rider_id, name, location, length_meters)
              SELECT $1, $2, $3, $4
              WHERE NOT EXISTS (
                  SELECT 1 FROM circuits WHERE rider_id = $1 AND lower(name) = lower($2)
              )",
        )
        .bind(rider_id)
        .bind(name)
        .bind(location)
        .bind(length)
        .execute(pool)
        .await?;
        added += result.rows_affected();
    }
    info!(%rider_id, added, "famous circuits imported");
    Ok(added)
}

/// Point the circuit at a stored map image.
///
/// # Errors
///
/// Returns `NotFound` if the circuit is not the rider's.
pub async fn set_map_image(pool: &PgPool, rider_id: Uuid, circuit_id: Uuid, url: &str) -> Result<CircuitRow, CircuitError> {
    sqlx::query_as::<_, CircuitRow>(&format!(
        "UPDATE circuits SET map_image_url = $3 WHERE id = $1 AND rider_id = $2 RETURNING {CIRCUIT_COLUMNS}"
    ))
    .bind(circuit_id)
    .bind(rider_id)
    .bind(url)
    .fetch_optional(pool)
    .await?
    .ok_or(CircuitError::NotFound(circuit_id))
}

#[cfg(test)]
#[path = "circuit_test.rs"]
mod tests;
