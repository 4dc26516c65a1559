//! Schema validation for observation payloads
//!
//! `validate` is pure and synchronous: a form can re-run it on every
//! keystroke (debounced by the caller) without side effects. Findings come
//! back in a stable order — required-field findings first, then per-field
//! findings in rule-table order — so repeated runs over the same payload
//! produce identical lists.
//!
//! Severity policy: structural violations (missing fields, format errors,
//! ratings off the scale, future dates) are errors; a marker value outside
//! its reference range is a clinically unusual but valid observation and
//! yields a warning, unless the protocol's safety parameters name that
//! marker critical, in which case it escalates to an error.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::collections::BTreeMap;

use crate::models::{
    DataPoint, LifecycleError, Measurement, ObservationPayload, Severity, ValidationError,
};
use crate::validators::rules::{
    self, ProtocolSafetyParameters, LAB_NAME_LENGTH, MAX_LAB_REPORT_AGE_DAYS, MAX_TEXT_LENGTH,
    RATING_SCALE, REQUIRED_LAB_MARKERS,
};

/// Validate a payload against the rule tables for its kind.
///
/// `None` means the caller has no payload object at all, which is itself an
/// error; empty optional collections inside a payload are fine.
pub fn validate(
    payload: Option<&ObservationPayload>,
    safety: &ProtocolSafetyParameters,
) -> Vec<ValidationError> {
    let Some(payload) = payload else {
        return vec![ValidationError::new(
            "payload",
            "missing_payload",
            Severity::Error,
            "payload object is required",
        )];
    };

    match payload {
        ObservationPayload::LabPanel {
            markers,
            test_date,
            lab_name,
            lab_certification,
        } => validate_lab_panel(markers, *test_date, lab_name, lab_certification, safety),
        ObservationPayload::CheckIn {
            energy_level,
            sleep_quality,
            side_effects,
            notes,
            ..
        } => validate_check_in(*energy_level, *sleep_quality, side_effects, notes),
        ObservationPayload::Biometric {
            measured_at,
            measurements,
        } => validate_biometric(*measured_at, measurements),
    }
}

/// Validate a data point's payload and record the outcome on it, advancing
/// `Pending → Validated | Rejected`.
pub fn apply_validation<'a>(
    data_point: &'a mut DataPoint,
    safety: &ProtocolSafetyParameters,
) -> Result<&'a [ValidationError], LifecycleError> {
    let errors = validate(Some(&data_point.payload), safety);
    tracing::debug!(
        data_point = %data_point.id,
        kind = ?data_point.kind(),
        findings = errors.len(),
        "Schema validation complete"
    );
    data_point.record_validation(errors)?;
    Ok(data_point.validation_errors())
}

fn validate_lab_panel(
    markers: &BTreeMap<String, f64>,
    test_date: NaiveDate,
    lab_name: &str,
    lab_certification: &str,
    safety: &ProtocolSafetyParameters,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Required markers first, in table order
    for marker in REQUIRED_LAB_MARKERS {
        if !markers.contains_key(*marker) {
            errors.push(ValidationError::new(
                format!("markers.{marker}"),
                "missing_required_marker",
                Severity::Error,
                format!("required marker {marker} is missing"),
            ));
        }
    }

    let name_len = lab_name.chars().count();
    if name_len < LAB_NAME_LENGTH.0 || name_len > LAB_NAME_LENGTH.1 {
        errors.push(ValidationError::new(
            "lab_name",
            "invalid_lab_name",
            Severity::Error,
            format!(
                "lab name must be {}-{} characters",
                LAB_NAME_LENGTH.0, LAB_NAME_LENGTH.1
            ),
        ));
    }

    if !rules::is_valid_lab_certification(lab_certification) {
        errors.push(ValidationError::new(
            "lab_certification",
            "invalid_lab_certification",
            Severity::Error,
            "lab certification code must be 4-10 uppercase letters or digits",
        ));
    }

    let today = Utc::now().date_naive();
    if test_date > today {
        errors.push(ValidationError::new(
            "test_date",
            "future_test_date",
            Severity::Error,
            "test date cannot be in the future",
        ));
    } else if (today - test_date).num_days() > MAX_LAB_REPORT_AGE_DAYS {
        errors.push(ValidationError::new(
            "test_date",
            "stale_test_date",
            Severity::Error,
            format!("test results must be within the last {MAX_LAB_REPORT_AGE_DAYS} days"),
        ));
    }

    for (marker, value) in markers {
        let field = format!("markers.{marker}");
        if !value.is_finite() {
            errors.push(ValidationError::new(
                field,
                "non_numeric_marker",
                Severity::Error,
                format!("marker {marker} must be a finite number"),
            ));
            continue;
        }
        if *value < 0.0 {
            errors.push(ValidationError::new(
                field,
                "negative_marker",
                Severity::Error,
                format!("marker {marker} cannot be negative"),
            ));
            continue;
        }

        // Protocol safety threshold replaces the default reference range
        // for critical markers, and escalates the finding to an error.
        if let Some(threshold) = safety.threshold(marker) {
            if !threshold.contains(*value) {
                errors.push(
                    ValidationError::new(
                        field,
                        "critical_marker_out_of_range",
                        Severity::Error,
                        format!(
                            "critical marker {marker} is outside the protocol safety range"
                        ),
                    )
                    .with_context(json!({
                        "value": value,
                        "min": threshold.min,
                        "max": threshold.max,
                    })),
                );
            }
        } else if let Some(range) = rules::lab_marker_range(marker) {
            if !range.contains(*value) {
                errors.push(
                    ValidationError::new(
                        field,
                        "marker_out_of_range",
                        Severity::Warning,
                        format!("marker {marker} is outside the reference range"),
                    )
                    .with_context(json!({
                        "value": value,
                        "unit": range.unit,
                        "min": range.min,
                        "max": range.max,
                    })),
                );
            }
        }
    }

    errors
}

fn validate_check_in(
    energy_level: i64,
    sleep_quality: i64,
    side_effects: &str,
    notes: &str,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, rating) in [("energy_level", energy_level), ("sleep_quality", sleep_quality)] {
        if rating < RATING_SCALE.0 || rating > RATING_SCALE.1 {
            errors.push(
                ValidationError::new(
                    field,
                    "rating_out_of_scale",
                    Severity::Error,
                    format!(
                        "rating must be between {} and {}",
                        RATING_SCALE.0, RATING_SCALE.1
                    ),
                )
                .with_context(json!({ "value": rating })),
            );
        }
    }

    for (field, text) in [("side_effects", side_effects), ("notes", notes)] {
        if text.chars().count() > MAX_TEXT_LENGTH {
            errors.push(ValidationError::new(
                field,
                "text_too_long",
                Severity::Error,
                format!("text cannot exceed {MAX_TEXT_LENGTH} characters"),
            ));
        }
    }

    errors
}

fn validate_biometric(
    measured_at: DateTime<Utc>,
    measurements: &BTreeMap<String, Measurement>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if measured_at > Utc::now() {
        errors.push(ValidationError::new(
            "measured_at",
            "future_measurement",
            Severity::Error,
            "measurement time cannot be in the future",
        ));
    }

    // An empty measurements map is a valid (if useless) reading; each entry
    // present must carry a well-formed unit and a non-negative finite value.
    for (name, measurement) in measurements {
        let field = format!("measurements.{name}");
        if !rules::is_valid_measurement_unit(&measurement.unit) {
            errors.push(
                ValidationError::new(
                    field.clone(),
                    "invalid_unit",
                    Severity::Error,
                    format!("measurement {name} has an invalid unit"),
                )
                .with_context(json!({ "unit": measurement.unit })),
            );
        }
        if !measurement.value.is_finite() || measurement.value < 0.0 {
            errors.push(ValidationError::new(
                field,
                "invalid_measurement_value",
                Severity::Error,
                format!("measurement {name} must be a non-negative number"),
            ));
        }
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::validators::rules::SafetyThreshold;
    use chrono::Duration;

    fn full_markers() -> BTreeMap<String, f64> {
        [
            ("vitamin_d", 45.0),
            ("crp", 1.2),
            ("hdl", 55.0),
            ("ldl", 100.0),
            ("triglycerides", 120.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn lab_panel(markers: BTreeMap<String, f64>) -> ObservationPayload {
        ObservationPayload::LabPanel {
            markers,
            test_date: Utc::now().date_naive() - Duration::days(3),
            lab_name: "Summit Diagnostics".to_string(),
            lab_certification: "CLIA1234".to_string(),
        }
    }

    #[test]
    fn test_missing_payload_is_an_error() {
        let errors = validate(None, &ProtocolSafetyParameters::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "payload");
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_complete_lab_panel_passes() {
        let errors = validate(
            Some(&lab_panel(full_markers())),
            &ProtocolSafetyParameters::default(),
        );
        assert!(errors.is_empty(), "unexpected findings: {errors:?}");
    }

    #[test]
    fn test_each_missing_marker_yields_an_error() {
        let mut markers = full_markers();
        markers.remove("crp");
        markers.remove("hdl");

        let errors = validate(
            Some(&lab_panel(markers)),
            &ProtocolSafetyParameters::default(),
        );
        let missing: Vec<_> = errors
            .iter()
            .filter(|e| e.code == "missing_required_marker")
            .collect();
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().all(|e| e.severity == Severity::Error));
        assert_eq!(missing[0].field, "markers.crp");
        assert_eq!(missing[1].field, "markers.hdl");
    }

    #[test]
    fn test_out_of_range_marker_is_a_warning() {
        let mut markers = full_markers();
        markers.insert("crp".to_string(), 14.0); // above 10 mg/L

        let errors = validate(
            Some(&lab_panel(markers)),
            &ProtocolSafetyParameters::default(),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "marker_out_of_range");
        assert_eq!(errors[0].severity, Severity::Warning);
        assert_eq!(errors[0].context["unit"], "mg/L");
    }

    #[test]
    fn test_critical_marker_escalates_to_error() {
        let mut markers = full_markers();
        markers.insert("crp".to_string(), 14.0);

        let mut safety = ProtocolSafetyParameters::default();
        safety
            .critical_markers
            .insert("crp".to_string(), SafetyThreshold { min: 0.0, max: 10.0 });

        let errors = validate(Some(&lab_panel(markers)), &safety);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "critical_marker_out_of_range");
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_future_and_stale_test_dates_rejected() {
        let future = ObservationPayload::LabPanel {
            markers: full_markers(),
            test_date: Utc::now().date_naive() + Duration::days(2),
            lab_name: "Summit Diagnostics".to_string(),
            lab_certification: "CLIA1234".to_string(),
        };
        let errors = validate(Some(&future), &ProtocolSafetyParameters::default());
        assert!(errors.iter().any(|e| e.code == "future_test_date"));

        let stale = ObservationPayload::LabPanel {
            markers: full_markers(),
            test_date: Utc::now().date_naive() - Duration::days(45),
            lab_name: "Summit Diagnostics".to_string(),
            lab_certification: "CLIA1234".to_string(),
        };
        let errors = validate(Some(&stale), &ProtocolSafetyParameters::default());
        assert!(errors.iter().any(|e| e.code == "stale_test_date"));
    }

    #[test]
    fn test_invalid_certification_rejected() {
        let payload = ObservationPayload::LabPanel {
            markers: full_markers(),
            test_date: Utc::now().date_naive(),
            lab_name: "Summit Diagnostics".to_string(),
            lab_certification: "bad-code".to_string(),
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert!(errors
            .iter()
            .any(|e| e.code == "invalid_lab_certification" && e.severity == Severity::Error));
    }

    #[test]
    fn test_check_in_rating_bounds() {
        let payload = ObservationPayload::CheckIn {
            energy_level: 0,
            sleep_quality: 6,
            side_effects: String::new(),
            notes: String::new(),
            symptoms: vec![],
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == "rating_out_of_scale"));
        assert_eq!(errors[0].field, "energy_level");
        assert_eq!(errors[1].field, "sleep_quality");
    }

    #[test]
    fn test_check_in_with_empty_text_fields_passes() {
        let payload = ObservationPayload::CheckIn {
            energy_level: 3,
            sleep_quality: 4,
            side_effects: String::new(),
            notes: String::new(),
            symptoms: vec![],
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_check_in_text_cap() {
        let payload = ObservationPayload::CheckIn {
            energy_level: 3,
            sleep_quality: 4,
            side_effects: "x".repeat(MAX_TEXT_LENGTH + 1),
            notes: String::new(),
            symptoms: vec![],
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "side_effects");
        assert_eq!(errors[0].code, "text_too_long");
    }

    #[test]
    fn test_biometric_empty_measurements_pass() {
        let payload = ObservationPayload::Biometric {
            measured_at: Utc::now() - Duration::minutes(10),
            measurements: BTreeMap::new(),
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_biometric_unit_and_value_rules() {
        let mut measurements = BTreeMap::new();
        measurements.insert(
            "heart_rate".to_string(),
            Measurement { value: 62.0, unit: "bpm".to_string() },
        );
        measurements.insert(
            "body_fat".to_string(),
            Measurement { value: -2.0, unit: "%".to_string() },
        );
        measurements.insert(
            "glucose".to_string(),
            Measurement { value: 90.0, unit: "mg dL".to_string() },
        );

        let payload = ObservationPayload::Biometric {
            measured_at: Utc::now() - Duration::minutes(10),
            measurements,
        };
        let errors = validate(Some(&payload), &ProtocolSafetyParameters::default());
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.field == "measurements.body_fat" && e.code == "invalid_measurement_value"));
        assert!(errors
            .iter()
            .any(|e| e.field == "measurements.glucose" && e.code == "invalid_unit"));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let payload = lab_panel(full_markers());
        let safety = ProtocolSafetyParameters::default();
        let first = validate(Some(&payload), &safety);
        let second = validate(Some(&payload), &safety);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_apply_validation_advances_status() {
        use crate::models::{DataPoint, DataPointStatus};
        use uuid::Uuid;

        let mut dp = DataPoint::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            lab_panel(full_markers()),
            Utc::now(),
        );
        apply_validation(&mut dp, &ProtocolSafetyParameters::default()).unwrap();
        assert_eq!(dp.status(), DataPointStatus::Validated);

        let mut bad = DataPoint::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ObservationPayload::CheckIn {
                energy_level: 9,
                sleep_quality: 3,
                side_effects: String::new(),
                notes: String::new(),
                symptoms: vec![],
            },
            Utc::now(),
        );
        apply_validation(&mut bad, &ProtocolSafetyParameters::default()).unwrap();
        assert_eq!(bad.status(), DataPointStatus::Rejected);
    }
}
