//! Confidence-based filtering of detected patterns
//!
//! Participants only ever see high-confidence patterns: the display
//! threshold floor is 0.95, and anything below the caller's threshold is
//! projected out. The projection is pure — no I/O, no mutation of the
//! underlying result — and preserves detection order.

use thiserror::Error;

use crate::models::analysis::{AnalysisResult, PatternDetection};

/// Domain floor for display thresholds
pub const MIN_CONFIDENCE_THRESHOLD: f64 = 0.95;

/// Upper bound for display thresholds
pub const MAX_CONFIDENCE_THRESHOLD: f64 = 1.0;

/// Caller supplied a threshold outside the display domain. A programming
/// error in the caller, not a user-facing condition.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error(
    "confidence threshold {threshold} outside \
     [{MIN_CONFIDENCE_THRESHOLD}, {MAX_CONFIDENCE_THRESHOLD}]"
)]
pub struct ThresholdError {
    pub threshold: f64,
}

fn validate_threshold(threshold: f64) -> Result<(), ThresholdError> {
    if (MIN_CONFIDENCE_THRESHOLD..=MAX_CONFIDENCE_THRESHOLD).contains(&threshold) {
        Ok(())
    } else {
        Err(ThresholdError { threshold })
    }
}

/// Patterns from `result` with confidence at or above `threshold`, in their
/// original detection order.
pub fn filter_patterns(
    result: &AnalysisResult,
    threshold: f64,
) -> Result<Vec<PatternDetection>, ThresholdError> {
    validate_threshold(threshold)?;
    Ok(result
        .patterns
        .iter()
        .filter(|pattern| pattern.confidence >= threshold)
        .cloned()
        .collect())
}

/// Recomputing view over the current analysis result.
///
/// Holds the latest result and threshold; the significant subset is
/// recomputed whenever either input is replaced, so `significant()` is a
/// cheap slice read for a UI that re-renders on every change notification.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    threshold: f64,
    result: Option<AnalysisResult>,
    significant: Vec<PatternDetection>,
}

impl PatternFilter {
    pub fn new(threshold: f64) -> Result<Self, ThresholdError> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            result: None,
            significant: Vec::new(),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Replace the threshold and recompute the significant subset
    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), ThresholdError> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        self.recompute();
        Ok(())
    }

    /// Replace the underlying result and recompute the significant subset
    pub fn set_result(&mut self, result: Option<AnalysisResult>) {
        self.result = result;
        self.recompute();
    }

    /// Current significant patterns, in detection order
    pub fn significant(&self) -> &[PatternDetection] {
        &self.significant
    }

    fn recompute(&mut self) {
        self.significant = match &self.result {
            Some(result) => result
                .patterns
                .iter()
                .filter(|pattern| pattern.confidence >= self.threshold)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{
        AnalysisMetadata, PatternKind, StatisticalSummary,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn pattern(metric: &str, confidence: f64) -> PatternDetection {
        PatternDetection {
            kind: PatternKind::Trend,
            metric: metric.to_string(),
            confidence,
            detected_at: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    fn result_with(confidences: &[f64]) -> AnalysisResult {
        AnalysisResult {
            protocol_id: Uuid::new_v4(),
            summary: StatisticalSummary {
                sample_size: 10,
                metrics: BTreeMap::new(),
                correlations: vec![],
                time_metrics: None,
            },
            patterns: confidences
                .iter()
                .enumerate()
                .map(|(i, c)| pattern(&format!("metric_{i}"), *c))
                .collect(),
            metadata: AnalysisMetadata {
                computation_version: "2.3.0".to_string(),
                data_quality: 0.99,
                completeness: 0.99,
                warnings: vec![],
            },
        }
    }

    #[test]
    fn test_filter_keeps_order_and_threshold() {
        let result = result_with(&[0.99, 0.80, 0.96]);
        let significant = filter_patterns(&result, 0.95).unwrap();

        assert_eq!(significant.len(), 2);
        assert_eq!(significant[0].metric, "metric_0");
        assert_eq!(significant[1].metric, "metric_2");
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let result = result_with(&[0.95]);
        let significant = filter_patterns(&result, 0.95).unwrap();
        assert_eq!(significant.len(), 1);
    }

    #[test]
    fn test_below_floor_threshold_rejected() {
        let result = result_with(&[0.99]);
        let err = filter_patterns(&result, 0.5).unwrap_err();
        assert_eq!(err.threshold, 0.5);

        assert!(filter_patterns(&result, 1.01).is_err());
        assert!(filter_patterns(&result, f64::NAN).is_err());
    }

    #[test]
    fn test_filter_does_not_mutate_result() {
        let result = result_with(&[0.99, 0.80]);
        filter_patterns(&result, 0.95).unwrap();
        assert_eq!(result.patterns.len(), 2);
    }

    #[test]
    fn test_view_recomputes_on_result_change() {
        let mut filter = PatternFilter::new(0.95).unwrap();
        assert!(filter.significant().is_empty());

        filter.set_result(Some(result_with(&[0.99, 0.80, 0.96])));
        assert_eq!(filter.significant().len(), 2);

        filter.set_result(Some(result_with(&[0.80])));
        assert!(filter.significant().is_empty());

        filter.set_result(None);
        assert!(filter.significant().is_empty());
    }

    #[test]
    fn test_view_recomputes_on_threshold_change() {
        let mut filter = PatternFilter::new(0.99).unwrap();
        filter.set_result(Some(result_with(&[0.99, 0.96])));
        assert_eq!(filter.significant().len(), 1);

        filter.set_threshold(0.95).unwrap();
        assert_eq!(filter.significant().len(), 2);
    }

    #[test]
    fn test_view_rejects_bad_threshold_and_keeps_state() {
        let mut filter = PatternFilter::new(0.95).unwrap();
        filter.set_result(Some(result_with(&[0.96])));

        assert!(filter.set_threshold(0.5).is_err());
        assert_eq!(filter.threshold(), 0.95);
        assert_eq!(filter.significant().len(), 1);
    }

    #[test]
    fn test_view_construction_rejects_bad_threshold() {
        assert!(PatternFilter::new(0.94).is_err());
        assert!(PatternFilter::new(0.95).is_ok());
        assert!(PatternFilter::new(1.0).is_ok());
    }
}
