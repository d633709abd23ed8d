//! Session report: a header plus a flat `(section, parameter, value, unit)`
//! table, the shape a PDF or spreadsheet export lays out.

use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::services::track_session::SessionDetail;
use crate::setup::FIELD_CATALOG;

#[derive(Debug, Clone, Serialize)]
pub struct ReportHeader {
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub date: Date,
    pub circuit: String,
    /// `"{brand} {model}"`, or `None` when the track day has no bike.
    pub bike: Option<String>,
    pub rider_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub section: String,
    pub parameter: String,
    /// Empty when the value was not recorded.
    pub value: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub header: ReportHeader,
    pub rows: Vec<ReportRow>,
}

/// Render a setup value for display: whole numbers without decimals, text
/// trimmed, absent as empty.
#[must_use]
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            Some(f) => format!("{f}"),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

impl SessionReport {
    #[must_use]
    pub fn build(detail: &SessionDetail) -> Self {
        let ctx = &detail.track_day;
        let bike = match (&ctx.bike_brand, &ctx.bike_model) {
            (Some(brand), Some(model)) => Some(format!("{brand} {model}")),
            _ => None,
        };
        let header = ReportHeader {
            name: detail.session.name.clone(),
            created_at: detail.session.created_at,
            date: ctx.date,
            circuit: ctx.circuit_name.clone(),
            bike,
            rider_weight: ctx.rider_weight,
        };

        let values = detail.session.setup.to_field_map();
        let rows = FIELD_CATALOG
            .iter()
            .map(|field| ReportRow {
                section: field.section.title().to_owned(),
                parameter: field.label.to_owned(),
                value: display_value(values.get(field.key)),
                unit: field.unit.unwrap_or_default().to_owned(),
            })
            .collect();

        Self { header, rows }
    }

    /// CSV with the header details as leading `Session` rows.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let h = &self.header;
        let weight = h.rider_weight.map(|w| display_value(Some(&Value::from(w)))).unwrap_or_default();
        let preamble = [
            ("Name", h.name.clone(), ""),
            ("Date", h.date.to_string(), ""),
            ("Circuit", h.circuit.clone(), ""),
            ("Bike", h.bike.clone().unwrap_or_default(), ""),
            ("Rider weight", weight, "kg"),
        ];

        let mut out = String::from("Section,Parameter,Value,Unit\n");
        for (parameter, value, unit) in preamble {
            push_csv_line(&mut out, ["Session", parameter, &value, unit]);
        }
        for row in &self.rows {
            push_csv_line(&mut out, [&row.section, &row.parameter, &row.value, &row.unit]);
        }
        out
    }

    /// File name for downloads, e.g. `session-2024-05-12-session-3.csv`.
    #[must_use]
    pub fn file_name(&self, ext: &str) -> String {
        let slug = self
            .header
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        format!("session-{}-{slug}.{ext}", self.header.date)
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_owned()
    }
}

fn push_csv_line(out: &mut String, cells: [&str; 4]) {
    let line = cells.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(",");
    let _ = writeln!(out, "{line}");
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
