//! mrp-client - Participant data pipeline for the MRP research platform
//!
//! Client-resident core pairing a submission integrity pipeline with an
//! analysis result cache:
//!
//! - **Submission**: schema validation → integrity tagging (content digest,
//!   scan, encryption metadata) → resilient upload (retry/backoff,
//!   cancellation, progress, idempotent request ids).
//! - **Analysis**: bounded TTL cache in front of the external analysis
//!   service, quality-gated, with confidence-based pattern filtering for
//!   display.
//!
//! UI, routing, authentication, and server-side storage live outside this
//! crate; the external services it talks to are the collaborator traits in
//! [`types`].

pub mod config;
pub mod models;
pub mod services;
pub mod types;
pub mod validators;

pub use config::PipelineConfig;
pub use models::{
    AnalysisResult, Attachment, DataPoint, DataPointStatus, ObservationPayload,
    PatternDetection, ValidationError,
};
pub use services::{
    AnalysisCache, AnalysisError, IntegrityError, IntegrityTagger, ThresholdError, UploadManager,
    UploadOptions, UploadOutcome,
};
pub use types::{AnalysisEndpoint, ContentScanner, SubmissionEndpoint};

use std::sync::Arc;

use mrp_common::{Clock, SystemClock};
use uuid::Uuid;

use services::{HttpAnalysisClient, HttpScanClient, HttpSubmissionClient};
use validators::ProtocolSafetyParameters;

/// Client pipeline facade bundling the collaborators.
///
/// Construction from [`PipelineConfig`] wires the HTTP clients; [`Pipeline::new`]
/// accepts arbitrary collaborator implementations (tests, alternative
/// transports).
pub struct Pipeline {
    safety: ProtocolSafetyParameters,
    tagger: IntegrityTagger,
    uploads: UploadManager,
    cache: AnalysisCache,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators
    pub fn new(
        submission: Arc<dyn SubmissionEndpoint>,
        analysis: Arc<dyn AnalysisEndpoint>,
        scanner: Arc<dyn ContentScanner>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
        safety: ProtocolSafetyParameters,
    ) -> Self {
        Self {
            safety,
            tagger: IntegrityTagger::new(
                scanner,
                config.attachment.max_bytes,
                config.attachment.allowed_content_types.clone(),
            ),
            uploads: UploadManager::new(
                submission,
                config.retry_policy(),
                config.request_timeout(),
            ),
            cache: AnalysisCache::new(analysis, clock, config.cache_config()),
        }
    }

    /// Assemble a pipeline over the HTTP collaborators named in `config`
    pub fn from_config(
        config: &PipelineConfig,
        safety: ProtocolSafetyParameters,
    ) -> mrp_common::Result<Self> {
        let timeout = config.request_timeout();
        let submission = HttpSubmissionClient::new(&config.submission_base_url, timeout)
            .map_err(|e| mrp_common::Error::Internal(e.to_string()))?;
        let analysis = HttpAnalysisClient::new(&config.analysis_base_url, timeout)
            .map_err(|e| mrp_common::Error::Internal(e.to_string()))?;
        let scanner = HttpScanClient::new(&config.scan_base_url, timeout)
            .map_err(|e| mrp_common::Error::Internal(e.to_string()))?;

        Ok(Self::new(
            Arc::new(submission),
            Arc::new(analysis),
            Arc::new(scanner),
            Arc::new(SystemClock),
            config,
            safety,
        ))
    }

    /// Validate a payload against the rule tables for its kind.
    /// Pure; findings are returned, never thrown.
    pub fn validate(&self, payload: Option<&ObservationPayload>) -> Vec<ValidationError> {
        validators::validate(payload, &self.safety)
    }

    /// Validate a data point's payload and advance its status
    pub fn apply_validation(
        &self,
        data_point: &mut DataPoint,
    ) -> Result<(), models::LifecycleError> {
        validators::apply_validation(data_point, &self.safety)?;
        Ok(())
    }

    /// Digest, scan, and stamp a validated data point for upload
    pub async fn tag_and_encrypt(
        &self,
        data_point: &mut DataPoint,
        attachment: Option<&Attachment>,
        key_id: &str,
    ) -> Result<(), IntegrityError> {
        self.tagger
            .tag_and_encrypt(data_point, attachment, key_id)
            .await
    }

    /// Transmit a tagged data point to the submission endpoint
    pub async fn upload(
        &self,
        data_point: &DataPoint,
        attachment: Option<Attachment>,
        options: UploadOptions,
    ) -> UploadOutcome {
        self.uploads.upload(data_point, attachment, options).await
    }

    /// Fetch (or serve from cache) the analysis result for a protocol
    pub async fn get_analysis(
        &self,
        protocol_id: Uuid,
        force_refresh: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        if force_refresh {
            self.cache.force_refresh(protocol_id).await
        } else {
            self.cache.get(protocol_id).await
        }
    }

    /// Significant patterns from `result` at `threshold`
    pub fn filter_patterns(
        &self,
        result: &AnalysisResult,
        threshold: f64,
    ) -> Result<Vec<PatternDetection>, ThresholdError> {
        services::filter_patterns(result, threshold)
    }

    /// The analysis cache, for peek/invalidate at the call site
    pub fn analysis_cache(&self) -> &AnalysisCache {
        &self.cache
    }
}
