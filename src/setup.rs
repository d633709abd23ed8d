//! Setup snapshot model and stepper input rules.
//!
//! DESIGN
//! ======
//! A session's setup is a flat record of optional values grouped into tires,
//! front suspension, rear suspension and geometry. It is stored as JSONB on
//! the `sessions` row so the comparator and the report can address fields by
//! key without a column per field.
//!
//! Numeric inputs go through a `FieldSpec` (range + step). Out-of-range values
//! are clamped, unparsable text is ignored so the caller keeps its previous
//! value. Nothing here rejects a submission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::form;
use crate::sag::{SagMeasurements, SagReading};

// =============================================================================
// SETUP RECORD
// =============================================================================

/// Suspension, tire and geometry values recorded for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    pub tires_model: Option<String>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub tire_pressure_f: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub tire_pressure_r: Option<f64>,

    pub fork_model: Option<String>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_spring: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_preload: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_comp: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_reb: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_oil_level: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_height: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_sag_static: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_sag_dynamic: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_l1: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_l2: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub fork_l3: Option<f64>,

    pub shock_model: Option<String>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_spring: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_preload: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_comp: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_reb: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_length: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_sag_static: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_sag_dynamic: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_l1: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_l2: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub shock_l3: Option<f64>,

    #[serde(deserialize_with = "form::loose_f64")]
    pub wheelbase: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub rake: Option<f64>,
    #[serde(deserialize_with = "form::loose_f64")]
    pub trail: Option<f64>,
}

impl Setup {
    /// Starting point for the next session on the same bike. Setups carry no
    /// per-session data, so this is a plain copy.
    #[must_use]
    pub fn inherit(&self) -> Self {
        self.clone()
    }

    /// Store a fork sag reading: the three lengths plus both derived sags.
    pub fn apply_fork_sag(&mut self, reading: &SagReading) {
        self.fork_l1 = Some(reading.measurements.l1);
        self.fork_l2 = Some(reading.measurements.l2);
        self.fork_l3 = Some(reading.measurements.l3);
        self.fork_sag_static = Some(reading.static_sag);
        self.fork_sag_dynamic = Some(reading.rider_sag);
    }

    /// Store a shock sag reading: the three lengths plus both derived sags.
    pub fn apply_shock_sag(&mut self, reading: &SagReading) {
        self.shock_l1 = Some(reading.measurements.l1);
        self.shock_l2 = Some(reading.measurements.l2);
        self.shock_l3 = Some(reading.measurements.l3);
        self.shock_sag_static = Some(reading.static_sag);
        self.shock_sag_dynamic = Some(reading.rider_sag);
    }

    /// Fork lengths, when all three were recorded.
    #[must_use]
    pub fn fork_measurements(&self) -> Option<SagMeasurements> {
        Some(SagMeasurements::new(self.fork_l1?, self.fork_l2?, self.fork_l3?))
    }

    /// Shock lengths, when all three were recorded.
    #[must_use]
    pub fn shock_measurements(&self) -> Option<SagMeasurements> {
        Some(SagMeasurements::new(self.shock_l1?, self.shock_l2?, self.shock_l3?))
    }

    /// Clamp every recorded numeric value into its field range. Sags are
    /// recomputed from the clamped lengths wherever all three are present.
    #[must_use]
    pub fn clamped(mut self, specs: &BTreeMap<String, FieldSpec>) -> Self {
        for (key, slot) in self.numeric_slots_mut() {
            if let (Some(value), Some(spec)) = (slot.as_mut(), specs.get(key)) {
                *value = spec.clamp(*value);
            }
        }
        if let Some(fork) = self.fork_measurements() {
            self.apply_fork_sag(&fork.reading());
        }
        if let Some(shock) = self.shock_measurements() {
            self.apply_shock_sag(&shock.reading());
        }
        self
    }

    /// Flatten into a key -> JSON value map for field-by-field comparison.
    #[must_use]
    pub fn to_field_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Directly entered numeric inputs. Derived sag values are excluded so a
    /// negative sag survives storage.
    fn numeric_slots_mut(&mut self) -> [(&'static str, &mut Option<f64>); 22] {
        [
            ("tire_pressure_f", &mut self.tire_pressure_f),
            ("tire_pressure_r", &mut self.tire_pressure_r),
            ("fork_spring", &mut self.fork_spring),
            ("fork_preload", &mut self.fork_preload),
            ("fork_comp", &mut self.fork_comp),
            ("fork_reb", &mut self.fork_reb),
            ("fork_oil_level", &mut self.fork_oil_level),
            ("fork_height", &mut self.fork_height),
            ("fork_l1", &mut self.fork_l1),
            ("fork_l2", &mut self.fork_l2),
            ("fork_l3", &mut self.fork_l3),
            ("shock_spring", &mut self.shock_spring),
            ("shock_preload", &mut self.shock_preload),
            ("shock_comp", &mut self.shock_comp),
            ("shock_reb", &mut self.shock_reb),
            ("shock_length", &mut self.shock_length),
            ("shock_l1", &mut self.shock_l1),
            ("shock_l2", &mut self.shock_l2),
            ("shock_l3", &mut self.shock_l3),
            ("wheelbase", &mut self.wheelbase),
            ("rake", &mut self.rake),
            ("trail", &mut self.trail),
        ]
    }
}

// =============================================================================
// FIELD CATALOG
// =============================================================================

/// Setup section a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Tires,
    Fork,
    Shock,
    Geometry,
}

impl Section {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Tires => "Tires",
            Self::Fork => "Fork",
            Self::Shock => "Shock",
            Self::Geometry => "Geometry",
        }
    }
}

/// One labelled setup field, used by the comparator and the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogField {
    pub section: Section,
    pub label: &'static str,
    pub key: &'static str,
    pub unit: Option<&'static str>,
}

const fn field(section: Section, label: &'static str, key: &'static str, unit: Option<&'static str>) -> CatalogField {
    CatalogField { section, label, key, unit }
}

/// Every reportable setup field in display order.
pub const FIELD_CATALOG: &[CatalogField] = &[
    field(Section::Tires, "Model", "tires_model", None),
    field(Section::Tires, "Front pressure", "tire_pressure_f", Some("bar")),
    field(Section::Tires, "Rear pressure", "tire_pressure_r", Some("bar")),
    field(Section::Fork, "Spring (K)", "fork_spring", Some("N/mm")),
    field(Section::Fork, "Preload", "fork_preload", Some("turns")),
    field(Section::Fork, "Compression", "fork_comp", Some("clicks")),
    field(Section::Fork, "Rebound", "fork_reb", Some("clicks")),
    field(Section::Fork, "Oil level", "fork_oil_level", Some("mm")),
    field(Section::Fork, "Height", "fork_height", Some("notches")),
    field(Section::Fork, "Static sag", "fork_sag_static", Some("mm")),
    field(Section::Fork, "Rider sag", "fork_sag_dynamic", Some("mm")),
    field(Section::Shock, "Spring (K)", "shock_spring", Some("N/mm")),
    field(Section::Shock, "Preload", "shock_preload", Some("mm")),
    field(Section::Shock, "Compression", "shock_comp", Some("clicks")),
    field(Section::Shock, "Rebound", "shock_reb", Some("clicks")),
    field(Section::Shock, "Length", "shock_length", Some("mm")),
    field(Section::Shock, "Static sag", "shock_sag_static", Some("mm")),
    field(Section::Shock, "Rider sag", "shock_sag_dynamic", Some("mm")),
    field(Section::Geometry, "Wheelbase", "wheelbase", Some("mm")),
    field(Section::Geometry, "Rake", "rake", Some("deg")),
    field(Section::Geometry, "Trail", "trail", Some("mm")),
];

// =============================================================================
// FIELD SPECS (STEPPER RULES)
// =============================================================================

/// Range and step for one numeric input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub unit: String,
}

impl FieldSpec {
    #[must_use]
    pub fn new(label: &str, min: f64, max: f64, step: f64, unit: &str) -> Self {
        Self { label: label.to_owned(), min, max, step, unit: unit.to_owned() }
    }

    /// Clamp into `[min, max]` and round to the step's decimal precision.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        let clamped = value.max(self.min).min(self.max);
        round_to(clamped, step_precision(self.step))
    }

    /// Parse a typed value. Accepts `,` as decimal separator.
    ///
    /// Returns `None` when the text is not a number; the caller keeps the
    /// value it had.
    #[must_use]
    pub fn clamp_input(&self, raw: &str) -> Option<f64> {
        let parsed = raw.trim().replace(',', ".").parse::<f64>().ok()?;
        if !parsed.is_finite() {
            return None;
        }
        Some(self.clamp(parsed))
    }

    /// One step up, or unchanged when that would leave the range.
    #[must_use]
    pub fn step_up(&self, value: f64) -> f64 {
        if value + self.step <= self.max { round_to(value + self.step, 2) } else { value }
    }

    /// One step down, or unchanged when that would leave the range.
    #[must_use]
    pub fn step_down(&self, value: f64) -> f64 {
        if value - self.step >= self.min { round_to(value - self.step, 2) } else { value }
    }
}

/// Number of decimals in the step's shortest decimal form (`0.1` -> 1, `5` -> 0).
fn step_precision(step: f64) -> u32 {
    let repr = format!("{step}");
    repr.split_once('.')
        .map_or(0, |(_, decimals)| u32::try_from(decimals.len()).unwrap_or(0))
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(0));
    (value * factor).round() / factor
}

/// Default ranges for every numeric setup field.
#[must_use]
pub fn default_field_specs() -> BTreeMap<String, FieldSpec> {
    let entries = [
        ("tire_pressure_f", FieldSpec::new("Front pressure", 0.0, 5.0, 0.1, "bar")),
        ("tire_pressure_r", FieldSpec::new("Rear pressure", 0.0, 5.0, 0.1, "bar")),
        ("fork_comp", FieldSpec::new("Compression", 0.0, 40.0, 1.0, "clicks")),
        ("fork_reb", FieldSpec::new("Rebound", 0.0, 40.0, 1.0, "clicks")),
        ("fork_preload", FieldSpec::new("Preload", 0.0, 20.0, 1.0, "turns")),
        ("fork_spring", FieldSpec::new("Spring (K)", 5.0, 15.0, 0.5, "N/mm")),
        ("fork_oil_level", FieldSpec::new("Oil level", 80.0, 200.0, 5.0, "mm")),
        ("fork_height", FieldSpec::new("Height", 0.0, 10.0, 1.0, "notches")),
        ("fork_sag_static", FieldSpec::new("Static sag", 0.0, 100.0, 1.0, "mm")),
        ("fork_sag_dynamic", FieldSpec::new("Rider sag", 0.0, 100.0, 1.0, "mm")),
        ("fork_l1", FieldSpec::new("L1 unloaded", 0.0, 1000.0, 1.0, "mm")),
        ("fork_l2", FieldSpec::new("L2 static", 0.0, 1000.0, 1.0, "mm")),
        ("fork_l3", FieldSpec::new("L3 with rider", 0.0, 1000.0, 1.0, "mm")),
        ("shock_comp", FieldSpec::new("Compression", 0.0, 40.0, 1.0, "clicks")),
        ("shock_reb", FieldSpec::new("Rebound", 0.0, 40.0, 1.0, "clicks")),
        ("shock_preload", FieldSpec::new("Preload", 0.0, 50.0, 1.0, "mm")),
        ("shock_spring", FieldSpec::new("Spring (K)", 50.0, 150.0, 5.0, "N/mm")),
        ("shock_length", FieldSpec::new("Length", 200.0, 400.0, 1.0, "mm")),
        ("shock_sag_static", FieldSpec::new("Static sag", 0.0, 100.0, 1.0, "mm")),
        ("shock_sag_dynamic", FieldSpec::new("Rider sag", 0.0, 100.0, 1.0, "mm")),
        ("shock_l1", FieldSpec::new("L1 unloaded", 0.0, 1000.0, 1.0, "mm")),
        ("shock_l2", FieldSpec::new("L2 static", 0.0, 1000.0, 1.0, "mm")),
        ("shock_l3", FieldSpec::new("L3 with rider", 0.0, 1000.0, 1.0, "mm")),
        ("wheelbase", FieldSpec::new("Wheelbase", 1000.0, 2000.0, 1.0, "mm")),
        ("rake", FieldSpec::new("Rake", 15.0, 35.0, 0.1, "deg")),
        ("trail", FieldSpec::new("Trail", 50.0, 150.0, 1.0, "mm")),
    ];
    entries
        .into_iter()
        .map(|(key, spec)| (key.to_owned(), spec))
        .collect()
}

/// Overlay rider overrides on the defaults. Unknown keys are ignored.
#[must_use]
pub fn merge_field_specs(overrides: &BTreeMap<String, FieldSpec>) -> BTreeMap<String, FieldSpec> {
    let mut specs = default_field_specs();
    for (key, spec) in overrides {
        if let Some(slot) = specs.get_mut(key)
            && spec.min <= spec.max
            && spec.step > 0.0
        {
            *slot = spec.clone();
        }
    }
    specs
}

#[cfg(test)]
#[path = "setup_test.rs"]
mod tests;
