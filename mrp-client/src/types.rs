//! Core types and collaborator traits for the submission pipeline
//!
//! The external services this client talks to — the submission endpoint,
//! the analysis endpoint, and the content scanner — are trait objects, so
//! the pipeline runs against the HTTP implementations in production and
//! against scripted fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AnalysisResult, Attachment, DataPoint};

// ============================================================================
// Progress reporting
// ============================================================================

/// Progress callback invoked with 0-100 as bytes are transmitted
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// Side-channel progress notifier handed to the submission endpoint.
///
/// Percentages are monotonic: a late, duplicate, or restarted report (a
/// retry re-sends from byte zero) never moves the bar backwards.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<Arc<ProgressFn>>,
    last: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(callback: Option<Arc<ProgressFn>>) -> Self {
        Self {
            callback,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Reporter that drops all notifications
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Report `sent` bytes out of `total`, as a 0-100 percentage
    pub fn report(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            ((sent.min(total) * 100) / total) as u8
        };
        self.report_percent(percent);
    }

    /// Report a raw percentage (clamped to 100)
    pub fn report_percent(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::Relaxed);
        if percent > previous {
            if let Some(callback) = &self.callback {
                callback(percent);
            }
        }
    }

    /// Report completion (100)
    pub fn complete(&self) {
        self.report_percent(100);
    }
}

// ============================================================================
// Submission endpoint
// ============================================================================

/// One submission attempt's payload: the tagged data point, the optional
/// attachment, and the stable request identifier the server uses to
/// deduplicate retried attempts.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub request_id: Uuid,
    pub data_point: DataPoint,
    pub attachment: Option<Arc<Attachment>>,
}

/// Acknowledgment returned by the submission endpoint on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub data_point_id: Uuid,
    pub request_id: Uuid,
    pub acknowledged_at: DateTime<Utc>,
}

/// Submission transport errors, classified for retry decisions
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl SubmitError {
    /// Transient failures are retried; everything else surfaces immediately
    pub fn is_transient(&self) -> bool {
        match self {
            SubmitError::Network(_) | SubmitError::Timeout => true,
            SubmitError::Http { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// External submission endpoint collaborator
#[async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    /// Transmit one attempt, reporting transfer progress through `progress`
    async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: &ProgressReporter,
    ) -> Result<SubmissionAck, SubmitError>;
}

// ============================================================================
// Analysis endpoint
// ============================================================================

/// Analysis fetch transport errors
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed analysis payload: {0}")]
    Decode(String),
}

/// External analysis endpoint collaborator
#[async_trait]
pub trait AnalysisEndpoint: Send + Sync {
    async fn fetch_analysis(&self, protocol_id: Uuid) -> Result<AnalysisResult, FetchError>;
}

// ============================================================================
// Content scanning
// ============================================================================

/// Content scan verdict for attachment bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    Clean,
    Infected,
}

/// Content scan transport/service errors
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Scanner error: {0}")]
    Service(String),
}

/// Virus/content scanning collaborator, consulted before upload
#[async_trait]
pub trait ContentScanner: Send + Sync {
    async fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ScanError>;
}

// ============================================================================
// Tests
// ============================================================================
