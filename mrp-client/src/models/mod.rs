//! Data models for the participant submission pipeline
//!
//! - `data_point`: submitted observations and their lifecycle
//! - `analysis`: protocol-level statistical results fetched for display

pub mod analysis;
pub mod data_point;

pub use analysis::{
    AnalysisMetadata, AnalysisResult, ConfidenceInterval, CorrelationEntry, MetricStats,
    PatternDetection, PatternKind, Quartiles, StatisticalSummary, TimeMetrics, ValueRange,
};
pub use data_point::{
    Attachment, DataPoint, DataPointKind, DataPointStatus, EncryptionMetadata, LifecycleError,
    Measurement, ObservationPayload, Severity, ValidationError, ENCRYPTION_ALGORITHM,
    ENCRYPTION_SCHEMA_VERSION,
};
