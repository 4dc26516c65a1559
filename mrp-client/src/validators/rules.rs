//! Declarative field rules per observation kind
//!
//! The tables here mirror the data-collection requirements of the research
//! protocols: required marker sets with unit-qualified reference ranges for
//! lab panels, 1-5 ratings and capped free text for check-ins, and a unit
//! grammar for biometric measurements. The validator consumes these tables;
//! it contains no per-field knowledge of its own.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Blood markers every lab panel must report
pub const REQUIRED_LAB_MARKERS: &[&str] = &["vitamin_d", "crp", "hdl", "ldl", "triglycerides"];

/// Character cap for free-text check-in fields
pub const MAX_TEXT_LENGTH: usize = 1000;

/// Inclusive rating scale for check-in ratings
pub const RATING_SCALE: (i64, i64) = (1, 5);

/// Allowed bounds for lab name length
pub const LAB_NAME_LENGTH: (usize, usize) = (2, 100);

/// Lab reports older than this are refused
pub const MAX_LAB_REPORT_AGE_DAYS: i64 = 30;

/// Laboratory certification code format
static LAB_CERTIFICATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{4,10}$").expect("static pattern"));

/// Measurement unit grammar (letters, `/`, `%`)
static MEASUREMENT_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z/%]+$").expect("static pattern"));

pub fn is_valid_lab_certification(code: &str) -> bool {
    LAB_CERTIFICATION_RE.is_match(code)
}

pub fn is_valid_measurement_unit(unit: &str) -> bool {
    MEASUREMENT_UNIT_RE.is_match(unit)
}

/// Reference range for a marker, qualified by the unit it is read in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerRange {
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
}

impl MarkerRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Declared reference ranges for the required lab markers
pub fn lab_marker_range(marker: &str) -> Option<MarkerRange> {
    let range = match marker {
        "vitamin_d" => MarkerRange { unit: "ng/mL", min: 20.0, max: 100.0 },
        "crp" => MarkerRange { unit: "mg/L", min: 0.0, max: 10.0 },
        "hdl" => MarkerRange { unit: "mg/dL", min: 40.0, max: 100.0 },
        "ldl" => MarkerRange { unit: "mg/dL", min: 0.0, max: 130.0 },
        "triglycerides" => MarkerRange { unit: "mg/dL", min: 0.0, max: 150.0 },
        _ => return None,
    };
    Some(range)
}

/// Safety threshold for a marker the protocol names as critical
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThreshold {
    pub min: f64,
    pub max: f64,
}

impl SafetyThreshold {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-protocol safety parameters.
///
/// A marker listed here is critical: out-of-range readings for it escalate
/// from warning to error severity, and the protocol's own threshold replaces
/// the default reference range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolSafetyParameters {
    #[serde(default)]
    pub critical_markers: BTreeMap<String, SafetyThreshold>,
}

impl ProtocolSafetyParameters {
    pub fn is_critical(&self, marker: &str) -> bool {
        self.critical_markers.contains_key(marker)
    }

    pub fn threshold(&self, marker: &str) -> Option<SafetyThreshold> {
        self.critical_markers.get(marker).copied()
    }
}
