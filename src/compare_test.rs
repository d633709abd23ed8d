use super::*;
use serde_json::json;
use time::macros::datetime;

fn session(name: &str, created_at: OffsetDateTime, fields: Value) -> ComparedSession {
    let Value::Object(fields) = fields else { panic!("fields must be an object") };
    ComparedSession { id: Uuid::new_v4(), name: name.to_owned(), created_at, fields }
}

fn fork_comp_only() -> Vec<CompareField<'static>> {
    vec![CompareField { label: "Compression", key: "fork_comp", unit: Some("clicks") }]
}

// =============================================================================
// ordering
// =============================================================================

#[test]
fn older_session_is_always_old_side() {
    let early = session("S1", datetime!(2024-05-12 09:00 UTC), json!({ "fork_comp": 12 }));
    let late = session("S2", datetime!(2024-05-12 11:00 UTC), json!({ "fork_comp": 13 }));

    let forward = compare(&early, &late, &fork_comp_only());
    let backward = compare(&late, &early, &fork_comp_only());

    assert_eq!(forward, backward);
    assert_eq!(forward.older.name, "S1");
    assert_eq!(forward.fields[0].old, json!(12));
    assert_eq!(forward.fields[0].new, json!(13));
}

#[test]
fn equal_timestamps_break_ties_by_id() {
    let at = datetime!(2024-05-12 09:00 UTC);
    let a = session("A", at, json!({}));
    let b = session("B", at, json!({}));
    let first = compare(&a, &b, &[]);
    let second = compare(&b, &a, &[]);
    assert_eq!(first.older.id, second.older.id);
    assert_eq!(first.older.id, a.id.min(b.id));
}

// =============================================================================
// change flags
// =============================================================================

#[test]
fn same_value_is_unchanged() {
    let a = session("S1", datetime!(2024-05-12 09:00 UTC), json!({ "fork_comp": 12 }));
    let b = session("S2", datetime!(2024-05-12 10:00 UTC), json!({ "fork_comp": 12 }));
    let result = compare(&a, &b, &fork_comp_only());
    assert!(!result.fields[0].changed);
    assert_eq!(result.changed_count(), 0);
}

#[test]
fn different_value_is_changed() {
    let a = session("S1", datetime!(2024-05-12 09:00 UTC), json!({ "fork_comp": 12 }));
    let b = session("S2", datetime!(2024-05-12 10:00 UTC), json!({ "fork_comp": 13 }));
    let result = compare(&a, &b, &fork_comp_only());
    assert!(result.fields[0].changed);
    assert_eq!(result.changed_keys(), vec!["fork_comp"]);
}

#[test]
fn self_comparison_flags_nothing() {
    let a = session(
        "S1",
        datetime!(2024-05-12 09:00 UTC),
        json!({ "fork_comp": 12, "tires_model": "SC1", "rake": null }),
    );
    let result = compare(&a, &a, &default_fields());
    assert_eq!(result.changed_count(), 0);
    assert_eq!(result.fields.len(), FIELD_CATALOG.len());
}

#[test]
fn missing_keys_render_as_null() {
    let a = session("S1", datetime!(2024-05-12 09:00 UTC), json!({}));
    let b = session("S2", datetime!(2024-05-12 10:00 UTC), json!({ "fork_comp": 12 }));
    let result = compare(&a, &b, &fork_comp_only());
    assert_eq!(result.fields[0].old, Value::Null);
    assert!(result.fields[0].changed);
}

// =============================================================================
// equality policy
// =============================================================================

#[test]
fn absent_forms_are_equal() {
    assert!(values_equal(None, Some(&json!(null))));
    assert!(values_equal(Some(&json!("")), Some(&json!(null))));
    assert!(values_equal(Some(&json!("  ")), None));
}

#[test]
fn absent_versus_zero_is_a_change() {
    assert!(!values_equal(Some(&json!(null)), Some(&json!(0))));
    assert!(!values_equal(None, Some(&json!("0"))));
}

#[test]
fn numbers_compare_within_tolerance() {
    assert!(values_equal(Some(&json!(2.1)), Some(&json!(2.1004))));
    assert!(!values_equal(Some(&json!(2.1)), Some(&json!(2.2))));
    assert!(values_equal(Some(&json!(12)), Some(&json!(12.0))));
}

#[test]
fn numeric_text_compares_as_number() {
    assert!(values_equal(Some(&json!("12")), Some(&json!(12))));
    assert!(values_equal(Some(&json!("2,1")), Some(&json!(2.1))));
}

#[test]
fn text_compares_trimmed_and_case_sensitive() {
    assert!(values_equal(Some(&json!(" SC1 ")), Some(&json!("SC1"))));
    assert!(!values_equal(Some(&json!("sc1")), Some(&json!("SC1"))));
}
