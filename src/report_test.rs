use super::*;
use serde_json::json;
use time::macros::{date, datetime};
use uuid::Uuid;

use crate::services::track_session::{SessionContext, SessionRow};
use crate::setup::Setup;

fn detail(name: &str, bike: Option<(&str, &str)>) -> SessionDetail {
    let setup = Setup {
        tires_model: Some("  Pirelli SC1 ".into()),
        tire_pressure_f: Some(2.3),
        fork_comp: Some(12.0),
        shock_sag_dynamic: Some(-3.0),
        rake: Some(23.5),
        ..Setup::default()
    };
    SessionDetail {
        session: SessionRow {
            id: Uuid::nil(),
            rider_id: Uuid::nil(),
            track_day_id: Uuid::nil(),
            session_number: 3,
            name: name.to_owned(),
            setup,
            notes: None,
            best_lap: Some("1:52.100".into()),
            lap_times: vec!["1:52.100".into()],
            created_at: datetime!(2024-05-12 14:30 UTC),
        },
        track_day: SessionContext {
            date: date!(2024 - 05 - 12),
            circuit_name: "Mugello".into(),
            rider_weight: Some(72.0),
            bike_brand: bike.map(|(b, _)| b.to_owned()),
            bike_model: bike.map(|(_, m)| m.to_owned()),
        },
    }
}

fn row<'a>(report: &'a SessionReport, section: &str, parameter: &str) -> &'a ReportRow {
    report
        .rows
        .iter()
        .find(|r| r.section == section && r.parameter == parameter)
        .unwrap()
}

// =============================================================================
// display_value
// =============================================================================

#[test]
fn whole_numbers_drop_decimals() {
    assert_eq!(display_value(Some(&json!(12.0))), "12");
    assert_eq!(display_value(Some(&json!(-3))), "-3");
}

#[test]
fn fractional_numbers_keep_decimals() {
    assert_eq!(display_value(Some(&json!(2.3))), "2.3");
}

#[test]
fn text_is_trimmed_and_absent_is_empty() {
    assert_eq!(display_value(Some(&json!("  SC1 "))), "SC1");
    assert_eq!(display_value(Some(&Value::Null)), "");
    assert_eq!(display_value(None), "");
}

// =============================================================================
// build
// =============================================================================

#[test]
fn build_fills_header_from_context() {
    let report = SessionReport::build(&detail("Session 3", Some(("Yamaha", "R1"))));
    assert_eq!(report.header.name, "Session 3");
    assert_eq!(report.header.circuit, "Mugello");
    assert_eq!(report.header.bike.as_deref(), Some("Yamaha R1"));
    assert_eq!(report.header.rider_weight, Some(72.0));
    assert_eq!(report.header.date, date!(2024 - 05 - 12));
}

#[test]
fn build_without_bike_has_no_bike_label() {
    let report = SessionReport::build(&detail("Session 3", None));
    assert_eq!(report.header.bike, None);
}

#[test]
fn build_has_one_row_per_catalog_field_in_order() {
    let report = SessionReport::build(&detail("Session 3", None));
    assert_eq!(report.rows.len(), FIELD_CATALOG.len());
    let params = report.rows.iter().map(|r| r.parameter.as_str()).collect::<Vec<_>>();
    let expected = FIELD_CATALOG.iter().map(|f| f.label).collect::<Vec<_>>();
    assert_eq!(params, expected);
}

#[test]
fn build_renders_values_and_units() {
    let report = SessionReport::build(&detail("Session 3", None));
    assert_eq!(row(&report, "Tires", "Model").value, "Pirelli SC1");
    assert_eq!(row(&report, "Tires", "Model").unit, "");
    assert_eq!(row(&report, "Tires", "Front pressure").value, "2.3");
    assert_eq!(row(&report, "Tires", "Front pressure").unit, "bar");
    assert_eq!(row(&report, "Fork", "Compression").value, "12");
    assert_eq!(row(&report, "Shock", "Rider sag").value, "-3");
    assert_eq!(row(&report, "Geometry", "Rake").value, "23.5");
    assert_eq!(row(&report, "Tires", "Rear pressure").value, "");
}

// =============================================================================
// to_csv / file_name
// =============================================================================

#[test]
fn csv_starts_with_header_and_session_rows() {
    let csv = SessionReport::build(&detail("Session 3", Some(("Yamaha", "R1")))).to_csv();
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "Section,Parameter,Value,Unit");
    assert_eq!(lines[1], "Session,Name,Session 3,");
    assert_eq!(lines[2], "Session,Date,2024-05-12,");
    assert_eq!(lines[3], "Session,Circuit,Mugello,");
    assert_eq!(lines[4], "Session,Bike,Yamaha R1,");
    assert_eq!(lines[5], "Session,Rider weight,72,kg");
    assert_eq!(lines[6], "Tires,Model,Pirelli SC1,");
    assert_eq!(lines.len(), 1 + 5 + FIELD_CATALOG.len());
}

#[test]
fn csv_quotes_commas_and_quotes() {
    let csv = SessionReport::build(&detail("Wet, \"slow\"", None)).to_csv();
    assert!(csv.contains("Session,Name,\"Wet, \"\"slow\"\"\","));
}

#[test]
fn csv_leaves_missing_weight_blank() {
    let mut d = detail("Session 3", None);
    d.track_day.rider_weight = None;
    let csv = SessionReport::build(&d).to_csv();
    assert!(csv.contains("Session,Rider weight,,kg\n"));
    assert!(csv.contains("Session,Bike,,\n"));
}

#[test]
fn file_name_slugs_the_session_name() {
    let report = SessionReport::build(&detail("Session 3 (wet!)", None));
    assert_eq!(report.file_name("csv"), "session-2024-05-12-session-3-wet.csv");
}
