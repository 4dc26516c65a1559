//! Analysis result model
//!
//! Protocol-scoped statistical summaries computed by the external analysis
//! service. The client never computes statistics itself; it validates the
//! shape and quality of what the service returns, caches it, and projects
//! the significant patterns for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Acceptance floor for `AnalysisMetadata::data_quality`
pub const MIN_DATA_QUALITY: f64 = 0.95;

/// Acceptance floor for `AnalysisMetadata::completeness`
pub const MIN_COMPLETENESS: f64 = 0.95;

/// Quartile breakdown of one tracked metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

/// Observed min/max of one tracked metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// 95% confidence interval around a metric mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Descriptive statistics for one tracked metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub quartiles: Quartiles,
    pub range: ValueRange,
    pub confidence_interval_95: ConfidenceInterval,
}

/// Pairwise correlation between two tracked metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub metrics: [String; 2],
    pub pearson: f64,
    pub spearman: f64,
}

/// Temporal extent of the analyzed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMetrics {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: i64,
}

/// Statistical summary over a protocol's aggregated data points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub sample_size: u64,
    pub metrics: BTreeMap<String, MetricStats>,
    #[serde(default)]
    pub correlations: Vec<CorrelationEntry>,
    #[serde(default)]
    pub time_metrics: Option<TimeMetrics>,
}

/// Detected statistical regularity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Trend,
    Cycle,
    Outlier,
    Cluster,
    Correlation,
}

/// One detected pattern with its confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDetection {
    pub kind: PatternKind,
    /// Primary metric the pattern was detected on
    pub metric: String,
    /// Detection confidence in [0.0, 1.0]
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    /// Kind-specific detail (trend slope/intercept, cycle period,
    /// correlated metric, ...)
    #[serde(default)]
    pub details: Value,
}

/// Provenance and quality scores for one analysis computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub computation_version: String,
    /// Data quality score in [0.0, 1.0]
    pub data_quality: f64,
    /// Input completeness score in [0.0, 1.0]
    pub completeness: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AnalysisMetadata {
    /// Both scores at or above the acceptance floor.
    ///
    /// Results below the floor are treated as fetch failures: partial
    /// analyses must never be displayed as authoritative.
    pub fn meets_quality_floor(&self) -> bool {
        self.data_quality >= MIN_DATA_QUALITY && self.completeness >= MIN_COMPLETENESS
    }
}

/// A protocol-scoped analysis result as returned by the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub protocol_id: Uuid,
    pub summary: StatisticalSummary,
    /// Detected patterns in detection order
    #[serde(default)]
    pub patterns: Vec<PatternDetection>,
    pub metadata: AnalysisMetadata,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(data_quality: f64, completeness: f64) -> AnalysisMetadata {
        AnalysisMetadata {
            computation_version: "2.3.0".to_string(),
            data_quality,
            completeness,
            warnings: vec![],
        }
    }

    #[test]
    fn test_quality_floor_boundaries() {
        assert!(metadata(0.95, 0.95).meets_quality_floor());
        assert!(metadata(1.0, 1.0).meets_quality_floor());
        assert!(!metadata(0.949, 0.99).meets_quality_floor());
        assert!(!metadata(0.99, 0.80).meets_quality_floor());
    }

    #[test]
    fn test_result_deserializes_with_optional_sections_absent() {
        let json = serde_json::json!({
            "protocol_id": Uuid::new_v4(),
            "summary": {
                "sample_size": 12,
                "metrics": {}
            },
            "metadata": {
                "computation_version": "2.3.0",
                "data_quality": 0.97,
                "completeness": 0.98
            }
        });

        let result: AnalysisResult = serde_json::from_value(json).unwrap();
        assert!(result.patterns.is_empty());
        assert!(result.summary.correlations.is_empty());
        assert!(result.summary.time_metrics.is_none());
        assert!(result.metadata.meets_quality_floor());
    }
}
