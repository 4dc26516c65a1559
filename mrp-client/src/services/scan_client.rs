//! HTTP content scanning client
//!
//! Ships attachment bytes to the scanning service before upload. Anything
//! other than an explicit `clean` verdict keeps the attachment out of the
//! pipeline.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{ContentScanner, ScanError, ScanVerdict};

const USER_AGENT: &str = concat!("mrp-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ScanResponse {
    status: String,
}

/// HTTP client for the external virus/content scanning service
pub struct HttpScanClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpScanClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScanError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn scan_url(&self) -> String {
        format!("{}/api/v1/scan", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContentScanner for HttpScanClient {
    async fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ScanError> {
        let url = self.scan_url();
        tracing::debug!(url = %url, size = bytes.len(), "Scanning attachment content");

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ScanError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScanError::Service(format!("HTTP {status}: {message}")));
        }

        let scan: ScanResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Service(format!("decode verdict: {e}")))?;

        match scan.status.as_str() {
            "clean" => Ok(ScanVerdict::Clean),
            "infected" => Ok(ScanVerdict::Infected),
            other => Err(ScanError::Service(format!("unknown verdict {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpScanClient::new("https://scan.example.org", Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_scan_url_format() {
        let client =
            HttpScanClient::new("https://scan.example.org/", Duration::from_secs(30)).unwrap();
        assert_eq!(client.scan_url(), "https://scan.example.org/api/v1/scan");
    }
}
