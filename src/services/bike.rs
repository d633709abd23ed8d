//! Garage service: bikes and the rider's active bike.
//!
//! DESIGN
//! ======
//! A rider has at most one active bike; new track days default to it. The
//! first bike a rider adds becomes active. Switching is done in a single
//! transaction (clear the others, then set the target) and a partial unique
//! index on `(rider_id) WHERE is_active` rejects any interleaving that would
//! leave two active bikes.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::form;

/// Palette of bike accent colors. Unknown ids fall back to the first entry.
pub const BIKE_COLORS: &[&str] = &["slate", "red", "orange", "amber", "green", "cyan", "blue", "violet", "pink"];

#[derive(Debug, thiserror::Error)]
pub enum BikeError {
    #[error("bike not found: {0}")]
    NotFound(Uuid),
    #[error("invalid bike: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BikeRow {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub name: String,
    pub weight: f64,
    pub color: String,
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Add/edit form. Numbers may arrive as text; unparsable ones use defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BikeInput {
    pub brand: String,
    pub model: String,
    #[serde(default, deserialize_with = "form::loose_i32")]
    pub year: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "form::loose_f64")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl BikeInput {
    /// Name shown in lists: the given one, else `"{brand} {model}"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        form::non_blank(self.name.as_deref())
            .map_or_else(|| format!("{} {}", self.brand.trim(), self.model.trim()).trim().to_owned(), str::to_owned)
    }

    #[must_use]
    pub fn resolved_color(&self) -> &'static str {
        let wanted = self.color.as_deref().unwrap_or_default().trim();
        BIKE_COLORS.iter().copied().find(|c| *c == wanted).unwrap_or(BIKE_COLORS[0])
    }

    fn validate(&self) -> Result<(), BikeError> {
        if self.brand.trim().is_empty() || self.model.trim().is_empty() {
            return Err(BikeError::Invalid("brand and model are required"));
        }
        Ok(())
    }
}

const BIKE_COLUMNS: &str = "id, rider_id, brand, model, year, name, weight, color, image_url, is_active, created_at";

/// List the rider's bikes, active first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_bikes(pool: &PgPool, rider_id: Uuid) -> Result<Vec<BikeRow>, BikeError> {
    let rows = sqlx::query_as::<_, BikeRow>(&format!(
        "SELECT {BIKE_COLUMNS} FROM bikes WHERE rider_id = $1 ORDER BY is_active DESC, created_at ASC"
    ))
    .bind(rider_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch one bike.
///
/// # Errors
///
/// Returns `NotFound` if the bike does not exist or belongs to someone else.
pub async fn get_bike(pool: &PgPool, rider_id: Uuid, bike_id: Uuid) -> Result<BikeRow, BikeError> {
    sqlx::query_as::<_, BikeRow>(&format!("SELECT {BIKE_COLUMNS} FROM bikes WHERE id = $1 AND rider_id = $2"))
        .bind(bike_id)
        .bind(rider_id)
        .fetch_optional(pool)
        .await?
        .ok_or(BikeError::NotFound(bike_id))
}

/// The rider's active bike, if any.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn active_bike(pool: &PgPool, rider_id: Uuid) -> Result<Option<BikeRow>, BikeError> {
    let row = sqlx::query_as::<_, BikeRow>(&format!(
        "SELECT {BIKE_COLUMNS} FROM bikes WHERE rider_id = $1 AND is_active"
    ))
    .bind(rider_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Add a bike under a caller-chosen id. Re-adding an existing id returns the
/// stored row unchanged.
///
/// # Errors
///
/// Returns `Invalid` when brand or model is blank.
pub async fn add_bike(pool: &PgPool, rider_id: Uuid, bike_id: Uuid, input: &BikeInput) -> Result<BikeRow, BikeError> {
    input.validate()?;

    let inserted = sqlx::query_as::<_, BikeRow>(&format!(
        r"INSERT INTO bikes (id, rider_id, brand, model, year, name, weight, color, is_active)
          SELECT $1, $2, $3, $4, $5, $6, $7, $8,
                 NOT EXISTS (SELECT 1 FROM bikes WHERE rider_id = $2)
          ON CONFLICT (id) DO NOTHING
          RETURNING {BIKE_COLUMNS}"
    ))
    .bind(bike_id)
    .bind(rider_id)
    .bind(input.brand.trim())
    .bind(input.model.trim())
    .bind(input.year)
    .bind(input.display_name())
    .bind(input.weight.unwrap_or(0.0))
    .bind(input.resolved_color())
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => {
            info!(bike_id = %row.id, %rider_id, active = row.is_active, "bike added");
            Ok(row)
        }
        None => get_bike(pool, rider_id, bike_id).await,
    }
}

/// Edit a bike's details.
///
/// # Errors
///
/// Returns `NotFound` if the bike is not the rider's.
pub async fn update_bike(pool: &PgPool, rider_id: Uuid, bike_id: Uuid, input: &BikeInput) -> Result<BikeRow, BikeError> {
    input.validate()?;

    sqlx::query_as::<_, BikeRow>(&format!(
        r"UPDATE bikes
          SET brand = $3, model = $4, year = $5, name = $6, weight = $7, color = $8
          WHERE id = $1 AND rider_id = $2
          RETURNING {BIKE_COLUMNS}"
    ))
    .bind(bike_id)
    .bind(rider_id)
    .bind(input.brand.trim())
    .bind(input.model.trim())
    .bind(input.year)
    .bind(input.display_name())
    .bind(input.weight.unwrap_or(0.0))
    .bind(input.resolved_color())
    .fetch_optional(pool)
    .await?
    .ok_or(BikeError::NotFound(bike_id))
}

/// Make `bike_id` the only active bike of the rider.
///
/// # Errors
///
/// Returns `NotFound` (and changes nothing) if the bike is not the rider's.
pub async fn set_active_bike(pool: &PgPool, rider_id: Uuid, bike_id: Uuid) -> Result<(), BikeError> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE bikes SET is_active = false WHERE rider_id = $1 AND is_active AND id <> $2")
        .bind(rider_id)
        .bind(bike_id)
        .execute(tx.as_mut())
        .await?;

    let result = sqlx::query("UPDATE bikes SET is_active = true WHERE id = $1 AND rider_id = $2")
        .bind(bike_id)
        .bind(rider_id)
        .execute(tx.as_mut())
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(BikeError::NotFound(bike_id));
    }

    tx.commit().await?;
    info!(%bike_id, %rider_id, "active bike switched");
    Ok(())
}

/// Delete a bike. When it was the active one, the most recently added
/// remaining bike takes over.
///
/// # Errors
///
/// Returns `NotFound` if the bike is not the rider's.
pub async fn delete_bike(pool: &PgPool, rider_id: Uuid, bike_id: Uuid) -> Result<(), BikeError> {
    let mut tx = pool.begin().await?;

    let was_active = sqlx::query_scalar::<_, bool>("DELETE FROM bikes WHERE id = $1 AND rider_id = $2 RETURNING is_active")
        .bind(bike_id)
        .bind(rider_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(BikeError::NotFound(bike_id))?;

    if was_active {
        sqlx::query(
            r"UPDATE bikes SET is_active = true
              WHERE id = (SELECT id FROM bikes WHERE rider_id = $1 ORDER BY created_at DESC LIMIT 1)",
        )
        .bind(rider_id)
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Point the bike at a stored image.
///
/// # Errors
///
/// Returns `NotFound` if the bike is not the rider's.
pub async fn set_bike_image(pool: &PgPool, rider_id: Uuid, bike_id: Uuid, url: &str) -> Result<BikeRow, BikeError> {
    sqlx::query_as::<_, BikeRow>(&format!(
        "UPDATE bikes SET image_url = $3 WHERE id = $1 AND rider_id = $2 RETURNING {BIKE_COLUMNS}"
    ))
    .bind(bike_id)
    .bind(rider_id)
    .bind(url)
    .fetch_optional(pool)
    .await?
    .ok_or(BikeError::NotFound(bike_id))
}

#[cfg(test)]
#[path = "bike_test.rs"]
mod tests;
