//! Configuration resolution for the client pipeline
//!
//! Settings resolve ENV → TOML config file → compiled default. Environment
//! variables win so a deployment can repoint endpoints without touching the
//! participant's config file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use mrp_common::config::{default_config_path, env_override, read_toml_config};
use mrp_common::time::millis_to_duration;
use mrp_common::Result;

use crate::services::analysis_cache::CacheConfig;
use crate::services::upload_manager::RetryPolicy;

/// Config file name under the platform config directory
pub const CONFIG_FILE_NAME: &str = "client.toml";

/// Retry bounds for transient submission failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

/// Attachment acceptance limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentSettings {
    pub max_bytes: usize,
    pub allowed_content_types: Vec<String>,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_content_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
            ],
        }
    }
}

/// Analysis cache sizing and freshness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_entries: 50,
        }
    }
}

/// Client pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub submission_base_url: String,
    pub analysis_base_url: String,
    pub scan_base_url: String,
    /// Per-attempt request timeout
    pub request_timeout_ms: u64,
    pub retry: RetrySettings,
    pub attachment: AttachmentSettings,
    pub cache: CacheSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            submission_base_url: "http://localhost:8000".to_string(),
            analysis_base_url: "http://localhost:8000".to_string(),
            scan_base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
            retry: RetrySettings::default(),
            attachment: AttachmentSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the platform config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = default_config_path(CONFIG_FILE_NAME);
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit path (or defaults when absent), then apply
    /// environment overrides
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config: PipelineConfig = match path {
            Some(path) => read_toml_config(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_override("MRP_SUBMISSION_URL") {
            self.submission_base_url = url;
        }
        if let Some(url) = env_override("MRP_ANALYSIS_URL") {
            self.analysis_base_url = url;
        }
        if let Some(url) = env_override("MRP_SCAN_URL") {
            self.scan_base_url = url;
        }
        if let Some(value) = env_override("MRP_REQUEST_TIMEOUT_MS") {
            match value.parse() {
                Ok(timeout_ms) => self.request_timeout_ms = timeout_ms,
                Err(_) => warn!(
                    value = %value,
                    "Ignoring non-numeric MRP_REQUEST_TIMEOUT_MS override"
                ),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        millis_to_duration(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: millis_to_duration(self.retry.base_delay_ms),
            max_delay: millis_to_duration(self.retry.max_delay_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }
}
