//! Sag calculator.
//!
//! Three lengths measured on the same suspension component (all millimetres):
//! L1 fully extended with the wheel off the ground, L2 loaded by the bike's
//! own weight, L3 loaded by bike plus seated rider.
//!
//! `static_sag = L1 - L2`, `rider_sag = L1 - L3`. A negative result means a
//! mis-measurement and is reported as-is, never rejected.

use serde::{Deserialize, Serialize};

use crate::setup::FieldSpec;

/// Tolerance used to decide whether a measurement moved since the reference.
const CHANGE_EPSILON: f64 = 0.001;

/// Stepper range applied to each sag length.
#[must_use]
pub fn length_spec() -> FieldSpec {
    FieldSpec::new("Length", 0.0, 1000.0, 1.0, "mm")
}

/// Raw lengths for one suspension component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SagMeasurements {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl SagMeasurements {
    #[must_use]
    pub fn new(l1: f64, l2: f64, l3: f64) -> Self {
        Self { l1, l2, l3 }
    }

    /// Clamp each length into the stepper range.
    #[must_use]
    pub fn clamped(self) -> Self {
        let spec = length_spec();
        Self { l1: spec.clamp(self.l1), l2: spec.clamp(self.l2), l3: spec.clamp(self.l3) }
    }

    /// Compute both sags from the current lengths.
    #[must_use]
    pub fn reading(self) -> SagReading {
        SagReading { static_sag: self.l1 - self.l2, rider_sag: self.l1 - self.l3, measurements: self }
    }
}

/// Derived sags together with the lengths they came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SagReading {
    pub static_sag: f64,
    pub rider_sag: f64,
    pub measurements: SagMeasurements,
}

impl SagReading {
    #[must_use]
    pub fn is_static_negative(&self) -> bool {
        self.static_sag < 0.0
    }

    #[must_use]
    pub fn is_rider_negative(&self) -> bool {
        self.rider_sag < 0.0
    }

    /// Which lengths differ from a previous session's measurements.
    #[must_use]
    pub fn changed_from(&self, reference: &SagMeasurements) -> MeasurementChanges {
        let m = &self.measurements;
        MeasurementChanges {
            l1: (m.l1 - reference.l1).abs() > CHANGE_EPSILON,
            l2: (m.l2 - reference.l2).abs() > CHANGE_EPSILON,
            l3: (m.l3 - reference.l3).abs() > CHANGE_EPSILON,
        }
    }
}

/// Per-length "moved since last session" flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeasurementChanges {
    pub l1: bool,
    pub l2: bool,
    pub l3: bool,
}

impl MeasurementChanges {
    #[must_use]
    pub fn any(&self) -> bool {
        self.l1 || self.l2 || self.l3
    }
}

#[cfg(test)]
#[path = "sag_test.rs"]
mod tests;
