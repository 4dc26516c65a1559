//! Upload manager: resilient transfer of tagged data points
//!
//! State machine: `Idle → InProgress → {Succeeded, Failed, Cancelled}`.
//! `InProgress` loops internally across retries; callers observe exactly one
//! terminal outcome. Transient failures (network error, timeout, HTTP 5xx,
//! HTTP 429) retry with exponential backoff up to the attempt bound; any
//! other 4xx surfaces immediately. Every attempt carries the same request
//! id, so the server can deduplicate an attempt that actually landed after
//! a client-perceived timeout.
//!
//! Concurrent `upload` calls for the same data point coalesce onto the one
//! in-flight transfer (a retry button and an automatic retry both active
//! must not double-send); the joining caller observes the first transfer's
//! outcome, and the first caller's progress callback and cancellation token
//! drive it.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{Attachment, DataPoint, DataPointStatus};
use crate::types::{ProgressFn, ProgressReporter, SubmissionAck, SubmissionEndpoint,
    SubmissionRequest, SubmitError};

/// Retry policy for transient submission failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt bound (first try included)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Upload failure, surfaced after retry handling
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("Data point {id} is not eligible for upload (status {status:?})")]
    NotEligible { id: Uuid, status: DataPointStatus },

    #[error("Submission rejected with HTTP {status}: {message}")]
    Permanent { status: u16, message: String },

    #[error("Upload failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: SubmitError },
}

/// Terminal upload outcome. Exactly one per transfer; cancellation is an
/// outcome, not an error.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Succeeded(SubmissionAck),
    Failed(UploadError),
    Cancelled,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadOutcome::Cancelled)
    }
}

/// Upload state, surfaced through tracing only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

/// Options for a single upload call
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Invoked with 0-100 as bytes are transmitted
    pub on_progress: Option<Arc<ProgressFn>>,
    /// Trigger to abort the transfer
    pub cancel: CancellationToken,
}

struct ManagerInner {
    endpoint: Arc<dyn SubmissionEndpoint>,
    policy: RetryPolicy,
    request_timeout: Duration,
    in_flight: Mutex<HashMap<Uuid, Shared<BoxFuture<'static, UploadOutcome>>>>,
}

/// Upload manager
pub struct UploadManager {
    inner: Arc<ManagerInner>,
}

impl UploadManager {
    pub fn new(
        endpoint: Arc<dyn SubmissionEndpoint>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                endpoint,
                policy,
                request_timeout,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Transmit a tagged data point to the submission endpoint.
    ///
    /// The data point itself is never mutated: acknowledgment lives in the
    /// returned `SubmissionAck`, not in the status field, so a cancelled or
    /// failed transfer cannot fabricate an acknowledged submission.
    pub async fn upload(
        &self,
        data_point: &DataPoint,
        attachment: Option<Attachment>,
        options: UploadOptions,
    ) -> UploadOutcome {
        if data_point.status() != DataPointStatus::Encrypted {
            tracing::warn!(
                data_point = %data_point.id,
                status = ?data_point.status(),
                "Refusing upload of untagged data point"
            );
            return UploadOutcome::Failed(UploadError::NotEligible {
                id: data_point.id,
                status: data_point.status(),
            });
        }

        let id = data_point.id;
        let transfer = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&id) {
                tracing::debug!(data_point = %id, "Joining in-flight upload");
                existing.clone()
            } else {
                let transfer = run_transfer(
                    self.inner.clone(),
                    data_point.clone(),
                    attachment.map(Arc::new),
                    options,
                )
                .boxed()
                .shared();
                in_flight.insert(id, transfer.clone());
                transfer
            }
        };

        transfer.await
    }
}

async fn run_transfer(
    inner: Arc<ManagerInner>,
    data_point: DataPoint,
    attachment: Option<Arc<Attachment>>,
    options: UploadOptions,
) -> UploadOutcome {
    let request = SubmissionRequest {
        request_id: Uuid::new_v4(),
        data_point,
        attachment,
    };
    let progress = ProgressReporter::new(options.on_progress.clone());

    tracing::debug!(
        data_point = %request.data_point.id,
        request_id = %request.request_id,
        state = ?UploadState::InProgress,
        "Upload started"
    );

    let mut backoff = inner.policy.base_delay;
    let mut attempt = 0u32;

    let outcome = loop {
        attempt += 1;

        if options.cancel.is_cancelled() {
            break UploadOutcome::Cancelled;
        }

        tracing::debug!(
            data_point = %request.data_point.id,
            request_id = %request.request_id,
            attempt,
            "Starting upload attempt"
        );

        let attempt_result = tokio::select! {
            _ = options.cancel.cancelled() => break UploadOutcome::Cancelled,
            result = tokio::time::timeout(
                inner.request_timeout,
                inner.endpoint.submit(&request, &progress),
            ) => match result {
                Ok(submit_result) => submit_result,
                Err(_) => Err(SubmitError::Timeout),
            },
        };

        match attempt_result {
            Ok(ack) => {
                progress.complete();
                break UploadOutcome::Succeeded(ack);
            }
            Err(err) if err.is_transient() => {
                if attempt >= inner.policy.max_attempts {
                    tracing::error!(
                        data_point = %request.data_point.id,
                        request_id = %request.request_id,
                        attempt,
                        error = %err,
                        "Upload failed: attempt bound reached"
                    );
                    break UploadOutcome::Failed(UploadError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                tracing::warn!(
                    data_point = %request.data_point.id,
                    request_id = %request.request_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient submission failure, will retry after backoff"
                );

                tokio::select! {
                    _ = options.cancel.cancelled() => break UploadOutcome::Cancelled,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(inner.policy.max_delay);
            }
            Err(SubmitError::Http { status, message }) => {
                break UploadOutcome::Failed(UploadError::Permanent { status, message });
            }
            // Network/Timeout are always transient; kept for exhaustiveness
            Err(err) => {
                break UploadOutcome::Failed(UploadError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
        }
    };

    let state = match &outcome {
        UploadOutcome::Succeeded(_) => UploadState::Succeeded,
        UploadOutcome::Failed(_) => UploadState::Failed,
        UploadOutcome::Cancelled => UploadState::Cancelled,
    };
    tracing::info!(
        data_point = %request.data_point.id,
        request_id = %request.request_id,
        attempts = attempt,
        state = ?state,
        "Upload finished"
    );

    inner
        .in_flight
        .lock()
        .unwrap()
        .remove(&request.data_point.id);

    // `request` (and with it the attachment buffer) drops here, on every
    // terminal path including cancellation.
    outcome
}

// ============================================================================
// Tests
// ============================================================================
