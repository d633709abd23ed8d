use super::*;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::{integration_pool, seed_rider};

fn input(brand: &str, model: &str) -> BikeInput {
    BikeInput { brand: brand.into(), model: model.into(), ..BikeInput::default() }
}

// =============================================================================
// BikeInput
// =============================================================================

#[test]
fn display_name_defaults_to_brand_and_model() {
    assert_eq!(input(" Yamaha ", "R1 ").display_name(), "Yamaha R1");
}

#[test]
fn display_name_prefers_given_name() {
    let bike = BikeInput { name: Some("  Track weapon ".into()), ..input("Yamaha", "R1") };
    assert_eq!(bike.display_name(), "Track weapon");
}

#[test]
fn blank_name_falls_back() {
    let bike = BikeInput { name: Some("   ".into()), ..input("Ducati", "Panigale V4") };
    assert_eq!(bike.display_name(), "Ducati Panigale V4");
}

#[test]
fn resolved_color_accepts_palette_entries() {
    let bike = BikeInput { color: Some("cyan".into()), ..input("Yamaha", "R1") };
    assert_eq!(bike.resolved_color(), "cyan");
}

#[test]
fn resolved_color_falls_back_to_first_palette_entry() {
    let unknown = BikeInput { color: Some("chartreuse".into()), ..input("Yamaha", "R1") };
    assert_eq!(unknown.resolved_color(), BIKE_COLORS[0]);
    assert_eq!(input("Yamaha", "R1").resolved_color(), BIKE_COLORS[0]);
}

#[test]
fn validate_requires_brand_and_model() {
    assert!(input("Yamaha", "R1").validate().is_ok());
    assert!(matches!(input("  ", "R1").validate(), Err(BikeError::Invalid(_))));
    assert!(matches!(input("Yamaha", "").validate(), Err(BikeError::Invalid(_))));
}

#[test]
fn form_numbers_may_arrive_as_text() {
    let bike: BikeInput = serde_json::from_value(serde_json::json!({
        "brand": "Aprilia",
        "model": "RSV4",
        "year": "2021",
        "weight": "180,5",
    }))
    .unwrap();
    assert_eq!(bike.year, Some(2021));
    assert_eq!(bike.weight, Some(180.5));
}

#[test]
fn unparsable_form_numbers_become_none() {
    let bike: BikeInput = serde_json::from_value(serde_json::json!({
        "brand": "Aprilia",
        "model": "RSV4",
        "year": "new",
        "weight": "",
    }))
    .unwrap();
    assert_eq!(bike.year, None);
    assert_eq!(bike.weight, None);
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
async fn active_ids(pool: &PgPool, rider_id: Uuid) -> Vec<Uuid> {
    list_bikes(pool, rider_id)
        .await
        .expect("list_bikes should succeed")
        .into_iter()
        .filter(|b| b.is_active)
        .map(|b| b.id)
        .collect()
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn first_bike_becomes_active_and_switching_keeps_one_active() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;

    let first = add_bike(&pool, rider, Uuid::new_v4(), &input("Yamaha", "R1")).await.expect("add first");
    let second = add_bike(&pool, rider, Uuid::new_v4(), &input("Ducati", "V4")).await.expect("add second");
    assert!(first.is_active);
    assert!(!second.is_active);

    set_active_bike(&pool, rider, second.id).await.expect("switch");
    assert_eq!(active_ids(&pool, rider).await, vec![second.id]);

    let missing = set_active_bike(&pool, rider, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(BikeError::NotFound(_))));
    assert_eq!(active_ids(&pool, rider).await, vec![second.id]);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn deleting_active_bike_promotes_newest_remaining() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;

    let first = add_bike(&pool, rider, Uuid::new_v4(), &input("Yamaha", "R1")).await.expect("add first");
    let second = add_bike(&pool, rider, Uuid::new_v4(), &input("Ducati", "V4")).await.expect("add second");

    delete_bike(&pool, rider, first.id).await.expect("delete active");
    assert_eq!(active_ids(&pool, rider).await, vec![second.id]);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn re_adding_same_id_returns_stored_row() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;
    let id = Uuid::new_v4();

    let stored = add_bike(&pool, rider, id, &input("Yamaha", "R1")).await.expect("add");
    let again = add_bike(&pool, rider, id, &input("Honda", "CBR")).await.expect("re-add");
    assert_eq!(again.id, stored.id);
    assert_eq!(again.brand, "Yamaha");
    assert_eq!(list_bikes(&pool, rider).await.expect("list").len(), 1);
}
