//! Pipeline services
//!
//! The integrity tagger, upload manager, analysis cache, and pattern filter
//! implement the client-side core; the `*_client` modules are the reqwest
//! implementations of the external collaborator traits in `crate::types`.

pub mod analysis_cache;
pub mod analysis_client;
pub mod integrity_tagger;
pub mod pattern_filter;
pub mod scan_client;
pub mod submission_client;
pub mod upload_manager;

pub use analysis_cache::{AnalysisCache, AnalysisError, CacheConfig, CacheEntry};
pub use analysis_client::HttpAnalysisClient;
pub use integrity_tagger::{IntegrityError, IntegrityTagger};
pub use pattern_filter::{
    filter_patterns, PatternFilter, ThresholdError, MIN_CONFIDENCE_THRESHOLD,
};
pub use scan_client::HttpScanClient;
pub use submission_client::{HttpSubmissionClient, REQUEST_ID_HEADER};
pub use upload_manager::{
    RetryPolicy, UploadError, UploadManager, UploadOptions, UploadOutcome,
};
