use super::*;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::{integration_pool, seed_rider};

#[test]
fn time_format_round_trips_and_defaults_to_24h() {
    assert_eq!(TimeFormat::parse("12h"), TimeFormat::Twelve);
    assert_eq!(TimeFormat::parse(" 24h "), TimeFormat::TwentyFour);
    assert_eq!(TimeFormat::parse("am/pm"), TimeFormat::TwentyFour);
    assert_eq!(TimeFormat::Twelve.as_str(), "12h");
    assert_eq!(TimeFormat::default(), TimeFormat::TwentyFour);
}

#[test]
fn unit_system_parse_is_case_insensitive() {
    assert_eq!(UnitSystem::parse("Imperial"), UnitSystem::Imperial);
    assert_eq!(UnitSystem::parse("metric"), UnitSystem::Metric);
    assert_eq!(UnitSystem::parse(""), UnitSystem::Metric);
    assert_eq!(UnitSystem::Imperial.as_str(), "imperial");
}

#[test]
fn serde_names_match_stored_values() {
    assert_eq!(serde_json::to_value(TimeFormat::Twelve).unwrap(), "12h");
    assert_eq!(serde_json::to_value(UnitSystem::Imperial).unwrap(), "imperial");
    let update: PreferencesUpdate = serde_json::from_value(serde_json::json!({ "time_format": "12h" })).unwrap();
    assert_eq!(update.time_format, Some(TimeFormat::Twelve));
    assert_eq!(update.unit_system, None);
    assert!(update.fields.is_none());
}

#[test]
fn defaults_carry_full_field_catalogue() {
    let prefs = Preferences::default();
    assert_eq!(prefs.fields, setup::default_field_specs());
}

#[test]
fn stored_row_merges_overrides_over_defaults() {
    let mut config = BTreeMap::new();
    config.insert("tire_pressure_f".to_owned(), FieldSpec::new("Front pressure", 1.5, 3.0, 0.05, "bar"));
    config.insert("not_a_field".to_owned(), FieldSpec::new("Bogus", 0.0, 1.0, 1.0, ""));
    let prefs = Preferences::from(PreferencesRow {
        time_format: "12h".into(),
        unit_system: "weird".into(),
        config,
    });

    assert_eq!(prefs.time_format, TimeFormat::Twelve);
    assert_eq!(prefs.unit_system, UnitSystem::Metric);
    assert_eq!(prefs.fields["tire_pressure_f"].min, 1.5);
    assert!(!prefs.fields.contains_key("not_a_field"));
    assert_eq!(prefs.fields.len(), setup::default_field_specs().len());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn partial_updates_keep_other_members() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;

    let defaults = get_preferences(&pool, rider).await.expect("defaults");
    assert_eq!(defaults.time_format, TimeFormat::TwentyFour);

    let first = PreferencesUpdate { unit_system: Some(UnitSystem::Imperial), ..PreferencesUpdate::default() };
    update_preferences(&pool, rider, &first).await.expect("first update");
    let second = PreferencesUpdate { time_format: Some(TimeFormat::Twelve), ..PreferencesUpdate::default() };
    let prefs = update_preferences(&pool, rider, &second).await.expect("second update");

    assert_eq!(prefs.unit_system, UnitSystem::Imperial);
    assert_eq!(prefs.time_format, TimeFormat::Twelve);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn inverted_range_is_rejected() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;
    let mut fields = BTreeMap::new();
    fields.insert("rake".to_owned(), FieldSpec::new("Rake", 30.0, 20.0, 0.1, "deg"));
    let update = PreferencesUpdate { fields: Some(fields), ..PreferencesUpdate::default() };
    let result = update_preferences(&pool, rider, &update).await;
    assert!(matches!(result, Err(PreferencesError::Invalid(_))));
}
