use super::*;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::{integration_pool, seed_rider};

#[test]
fn unknown_circuit_becomes_invalid_input() {
    let err = TrackDayError::from(circuit::CircuitError::NotFound(Uuid::nil()));
    assert!(matches!(err, TrackDayError::Invalid("unknown circuit")));
}

#[test]
fn unknown_bike_becomes_invalid_input() {
    let err = TrackDayError::from(bike::BikeError::NotFound(Uuid::nil()));
    assert!(matches!(err, TrackDayError::Invalid("unknown bike")));
}

#[test]
fn database_errors_pass_through() {
    let err = TrackDayError::from(bike::BikeError::Database(sqlx::Error::PoolTimedOut));
    assert!(matches!(err, TrackDayError::Database(sqlx::Error::PoolTimedOut)));
    let err = TrackDayError::from(circuit::CircuitError::Database(sqlx::Error::RowNotFound));
    assert!(matches!(err, TrackDayError::Database(sqlx::Error::RowNotFound)));
}

#[test]
fn input_parses_iso_date_and_text_weight() {
    let input: TrackDayInput = serde_json::from_value(serde_json::json!({
        "date": "2024-05-12",
        "circuit_name": "Mugello",
        "rider_weight": "72,5",
    }))
    .unwrap();
    assert_eq!(input.date, time::macros::date!(2024 - 05 - 12));
    assert_eq!(input.rider_weight, Some(72.5));
    assert_eq!(input.bike_id, None);
}

#[test]
fn input_rejects_malformed_date() {
    let parsed = serde_json::from_value::<TrackDayInput>(serde_json::json!({ "date": "12/05/2024" }));
    assert!(parsed.is_err());
}

#[cfg(feature = "live-db-tests")]
fn day(circuit: &str) -> TrackDayInput {
    TrackDayInput {
        date: time::macros::date!(2024 - 05 - 12),
        circuit_id: None,
        circuit_name: Some(circuit.into()),
        bike_id: None,
        rider_weight: None,
        weather: None,
    }
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn new_track_day_defaults_to_active_bike() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;
    let bike_input = bike::BikeInput { brand: "Yamaha".into(), model: "R1".into(), ..bike::BikeInput::default() };
    let bike = bike::add_bike(&pool, rider, Uuid::new_v4(), &bike_input).await.expect("add bike");

    let row = create_track_day(&pool, rider, Uuid::new_v4(), &day("Mugello")).await.expect("create");
    assert_eq!(row.bike_id, Some(bike.id));

    let summaries = list_track_days(&pool, rider).await.expect("list");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].bike.as_ref().map(|b| b.id), Some(bike.id));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn track_day_requires_a_circuit() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;
    let result = create_track_day(&pool, rider, Uuid::new_v4(), &day("  ")).await;
    assert!(matches!(result, Err(TrackDayError::Invalid(_))));
}
