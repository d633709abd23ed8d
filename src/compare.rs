//! Session comparator.
//!
//! DESIGN
//! ======
//! Two session records are ordered chronologically (older first, ties broken
//! by id) so the result does not depend on which one the rider picked first.
//! Each requested field is then paired old -> new and flagged when the values
//! differ.
//!
//! EQUALITY POLICY
//! ===============
//! - `null`, a missing key and an empty/blank string are all "absent".
//! - Two absent values are equal; absent vs present is a change.
//! - Numbers (and numeric-looking strings) are equal within `0.001`.
//! - Other text compares after trimming, case-sensitively.
//! - Anything else (bools, arrays, objects) uses structural equality.

use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::setup::FIELD_CATALOG;

const NUMERIC_TOLERANCE: f64 = 0.001;

/// A `(label, key, unit)` triple naming one field to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareField<'a> {
    pub label: &'a str,
    pub key: &'a str,
    pub unit: Option<&'a str>,
}

/// The full setup catalog as comparison fields.
#[must_use]
pub fn default_fields() -> Vec<CompareField<'static>> {
    FIELD_CATALOG
        .iter()
        .map(|f| CompareField { label: f.label, key: f.key, unit: f.unit })
        .collect()
}

/// One side of a comparison.
#[derive(Debug, Clone)]
pub struct ComparedSession {
    pub id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub fields: Map<String, Value>,
}

/// Identity of a compared session, echoed in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHeader {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One compared field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub label: String,
    pub key: String,
    pub unit: Option<String>,
    pub old: Value,
    pub new: Value,
    pub changed: bool,
}

/// Result of comparing two sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub older: SessionHeader,
    pub newer: SessionHeader,
    pub fields: Vec<FieldDiff>,
}

impl Comparison {
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.fields.iter().filter(|f| f.changed).count()
    }

    #[must_use]
    pub fn changed_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.changed)
            .map(|f| f.key.as_str())
            .collect()
    }
}

/// Compare two sessions over the given fields.
#[must_use]
pub fn compare(a: &ComparedSession, b: &ComparedSession, fields: &[CompareField<'_>]) -> Comparison {
    let (older, newer) = if (a.created_at, a.id) <= (b.created_at, b.id) { (a, b) } else { (b, a) };

    let diffs = fields
        .iter()
        .map(|field| {
            let old = older.fields.get(field.key);
            let new = newer.fields.get(field.key);
            FieldDiff {
                label: field.label.to_owned(),
                key: field.key.to_owned(),
                unit: field.unit.map(str::to_owned),
                old: old.cloned().unwrap_or(Value::Null),
                new: new.cloned().unwrap_or(Value::Null),
                changed: !values_equal(old, new),
            }
        })
        .collect();

    Comparison { older: header(older), newer: header(newer), fields: diffs }
}

fn header(session: &ComparedSession) -> SessionHeader {
    SessionHeader { id: session.id, name: session.name.clone(), created_at: session.created_at }
}

enum Normalized<'a> {
    Absent,
    Number(f64),
    Text(&'a str),
    Other(&'a Value),
}

fn normalize(value: Option<&Value>) -> Normalized<'_> {
    match value {
        None | Some(Value::Null) => Normalized::Absent,
        Some(Value::Number(n)) => n.as_f64().map_or(Normalized::Absent, Normalized::Number),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Normalized::Absent
            } else if let Ok(n) = trimmed.replace(',', ".").parse::<f64>()
                && n.is_finite()
            {
                Normalized::Number(n)
            } else {
                Normalized::Text(trimmed)
            }
        }
        Some(other) => Normalized::Other(other),
    }
}

/// Field equality under the policy described in the module docs.
#[must_use]
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (Normalized::Absent, Normalized::Absent) => true,
        (Normalized::Number(x), Normalized::Number(y)) => (x - y).abs() <= NUMERIC_TOLERANCE,
        (Normalized::Text(x), Normalized::Text(y)) => x == y,
        (Normalized::Other(x), Normalized::Other(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
