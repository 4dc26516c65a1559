//! Data point model and submission lifecycle
//!
//! A `DataPoint` is one participant observation tied to a research protocol.
//! It is created client-side at submission time and mutated only by the
//! pipeline stages: the schema validator attaches findings and advances the
//! status, the integrity tagger stamps encryption metadata and the content
//! digest. A status only ever advances:
//!
//! ```text
//! Pending ──► Validated ──► Encrypted
//!    └──────► Rejected
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Encryption algorithm identifier stamped by the integrity tagger
pub const ENCRYPTION_ALGORITHM: &str = "fernet-aes128-cbc";

/// Encryption metadata schema version
pub const ENCRYPTION_SCHEMA_VERSION: &str = "1.0";

/// Data point lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPointStatus {
    /// Created, not yet validated
    Pending,
    /// Passed schema validation (no error-severity findings)
    Validated,
    /// Failed schema validation; terminal
    Rejected,
    /// Integrity-tagged and eligible for upload
    Encrypted,
}

/// Data point kind (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataPointKind {
    #[serde(rename = "lab-panel")]
    LabPanel,
    #[serde(rename = "periodic-check-in")]
    CheckIn,
    #[serde(rename = "biometric-reading")]
    Biometric,
}

/// Validation finding severity. Only `Error` blocks submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation finding attached to a data point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field the finding refers to (dotted path for nested fields,
    /// e.g. `markers.crp`)
    pub field: String,
    /// Human-readable description
    pub message: String,
    /// Machine code (stable across message wording changes)
    pub code: String,
    pub severity: Severity,
    /// Free-form context (observed value, expected range, ...)
    #[serde(default)]
    pub context: Value,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            severity,
            context: Value::Null,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Error-severity findings block submission
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Unit-qualified biometric measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    /// Unit string, e.g. `bpm`, `mmHg`, `%`
    pub unit: String,
}

/// Typed observation payload, one variant per data point kind.
///
/// The tag mirrors `DataPointKind`, so the wire form carries the kind
/// alongside the kind-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObservationPayload {
    /// Lab marker panel from a certified laboratory
    #[serde(rename = "lab-panel")]
    LabPanel {
        /// Marker name → measured value (units fixed per marker)
        markers: BTreeMap<String, f64>,
        test_date: NaiveDate,
        lab_name: String,
        /// Laboratory certification code
        lab_certification: String,
    },
    /// Periodic participant check-in
    #[serde(rename = "periodic-check-in")]
    CheckIn {
        /// 1-5 rating
        energy_level: i64,
        /// 1-5 rating
        sleep_quality: i64,
        #[serde(default)]
        side_effects: String,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        symptoms: Vec<String>,
    },
    /// Biometric reading from a device or manual entry
    #[serde(rename = "biometric-reading")]
    Biometric {
        measured_at: DateTime<Utc>,
        measurements: BTreeMap<String, Measurement>,
    },
}

impl ObservationPayload {
    /// Kind discriminant for this payload
    pub fn kind(&self) -> DataPointKind {
        match self {
            ObservationPayload::LabPanel { .. } => DataPointKind::LabPanel,
            ObservationPayload::CheckIn { .. } => DataPointKind::CheckIn,
            ObservationPayload::Biometric { .. } => DataPointKind::Biometric,
        }
    }
}

/// Provenance stamped onto a data point by the integrity tagger.
/// Not modified by anything else afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    pub algorithm: String,
    /// Identifier of the key used, never key material
    pub key_id: String,
    pub encrypted_at: DateTime<Utc>,
    pub schema_version: String,
}

/// Binary attachment accompanying a data point (e.g. a lab report PDF)
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    /// Declared MIME type; checked against the allow-list and the bytes
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Attempted status transition that violates the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid data point status transition: {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub from: DataPointStatus,
    pub to: DataPointStatus,
}

/// One submitted observation tied to a protocol and participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub id: Uuid,
    pub protocol_id: Uuid,
    pub participant_id: Uuid,
    pub payload: ObservationPayload,
    pub recorded_at: DateTime<Utc>,
    /// Fields subject to encryption, from the protocol's data classification
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
    status: DataPointStatus,
    #[serde(default)]
    validation_errors: Vec<ValidationError>,
    #[serde(default)]
    encryption: Option<EncryptionMetadata>,
    /// SHA-256 hex digest of the attachment content, set by the tagger
    #[serde(default)]
    content_digest: Option<String>,
}

impl DataPoint {
    pub fn new(
        protocol_id: Uuid,
        participant_id: Uuid,
        payload: ObservationPayload,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            protocol_id,
            participant_id,
            payload,
            recorded_at,
            sensitive_fields: Vec::new(),
            status: DataPointStatus::Pending,
            validation_errors: Vec::new(),
            encryption: None,
            content_digest: None,
        }
    }

    pub fn kind(&self) -> DataPointKind {
        self.payload.kind()
    }

    pub fn status(&self) -> DataPointStatus {
        self.status
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    pub fn encryption(&self) -> Option<&EncryptionMetadata> {
        self.encryption.as_ref()
    }

    pub fn content_digest(&self) -> Option<&str> {
        self.content_digest.as_deref()
    }

    /// Any error-severity finding attached
    pub fn has_blocking_errors(&self) -> bool {
        self.validation_errors.iter().any(ValidationError::is_blocking)
    }

    /// Record validator output and advance `Pending → Validated | Rejected`.
    ///
    /// Refused once the point has left `Pending`: a later, stricter
    /// validation pass must not demote an already-validated point.
    pub(crate) fn record_validation(
        &mut self,
        errors: Vec<ValidationError>,
    ) -> Result<(), LifecycleError> {
        if self.status != DataPointStatus::Pending {
            return Err(LifecycleError {
                from: self.status,
                to: DataPointStatus::Validated,
            });
        }
        let rejected = errors.iter().any(ValidationError::is_blocking);
        self.validation_errors = errors;
        self.status = if rejected {
            DataPointStatus::Rejected
        } else {
            DataPointStatus::Validated
        };
        Ok(())
    }

    /// Record integrity tagging and advance `Validated → Encrypted`.
    ///
    /// Re-tagging an `Encrypted` point is permitted (same digest for the
    /// same content, fresh `encrypted_at`); `Pending`/`Rejected` are refused.
    pub(crate) fn record_encryption(
        &mut self,
        metadata: EncryptionMetadata,
        content_digest: Option<String>,
    ) -> Result<(), LifecycleError> {
        match self.status {
            DataPointStatus::Validated | DataPointStatus::Encrypted => {
                self.encryption = Some(metadata);
                self.content_digest = content_digest;
                self.status = DataPointStatus::Encrypted;
                Ok(())
            }
            from => Err(LifecycleError {
                from,
                to: DataPointStatus::Encrypted,
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn check_in_payload() -> ObservationPayload {
        ObservationPayload::CheckIn {
            energy_level: 4,
            sleep_quality: 3,
            side_effects: String::new(),
            notes: "slept well".to_string(),
            symptoms: vec![],
        }
    }

    fn new_point() -> DataPoint {
        DataPoint::new(Uuid::new_v4(), Uuid::new_v4(), check_in_payload(), Utc::now())
    }

    fn metadata() -> EncryptionMetadata {
        EncryptionMetadata {
            algorithm: ENCRYPTION_ALGORITHM.to_string(),
            key_id: "key-1".to_string(),
            encrypted_at: Utc::now(),
            schema_version: ENCRYPTION_SCHEMA_VERSION.to_string(),
        }
    }

    #[test]
    fn test_new_point_is_pending() {
        let dp = new_point();
        assert_eq!(dp.status(), DataPointStatus::Pending);
        assert!(dp.validation_errors().is_empty());
        assert!(dp.encryption().is_none());
    }

    #[test]
    fn test_validation_without_blocking_errors_validates() {
        let mut dp = new_point();
        let warnings = vec![ValidationError::new(
            "markers.crp",
            "out_of_range",
            Severity::Warning,
            "above reference range",
        )];
        dp.record_validation(warnings).unwrap();
        assert_eq!(dp.status(), DataPointStatus::Validated);
        assert!(!dp.has_blocking_errors());
    }

    #[test]
    fn test_blocking_error_rejects() {
        let mut dp = new_point();
        let errors = vec![ValidationError::new(
            "energy_level",
            "rating_out_of_scale",
            Severity::Error,
            "rating must be between 1 and 5",
        )];
        dp.record_validation(errors).unwrap();
        assert_eq!(dp.status(), DataPointStatus::Rejected);
        assert!(dp.has_blocking_errors());
    }

    #[test]
    fn test_validation_refused_after_pending() {
        let mut dp = new_point();
        dp.record_validation(vec![]).unwrap();
        let err = dp.record_validation(vec![]).unwrap_err();
        assert_eq!(err.from, DataPointStatus::Validated);
    }

    #[test]
    fn test_encryption_requires_validated() {
        let mut dp = new_point();
        let err = dp.record_encryption(metadata(), None).unwrap_err();
        assert_eq!(err.from, DataPointStatus::Pending);

        dp.record_validation(vec![]).unwrap();
        dp.record_encryption(metadata(), Some("ab".repeat(32))).unwrap();
        assert_eq!(dp.status(), DataPointStatus::Encrypted);
        assert!(dp.content_digest().is_some());
    }

    #[test]
    fn test_rejected_point_cannot_be_encrypted() {
        let mut dp = new_point();
        dp.record_validation(vec![ValidationError::new(
            "payload",
            "missing_payload",
            Severity::Error,
            "payload object is required",
        )])
        .unwrap();
        assert_eq!(dp.status(), DataPointStatus::Rejected);
        assert!(dp.record_encryption(metadata(), None).is_err());
    }

    #[test]
    fn test_payload_tag_round_trip() {
        let json = serde_json::to_value(check_in_payload()).unwrap();
        assert_eq!(json["type"], "periodic-check-in");

        let back: ObservationPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), DataPointKind::CheckIn);
    }
}
