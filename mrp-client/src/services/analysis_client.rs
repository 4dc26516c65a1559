//! HTTP analysis endpoint client

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::models::AnalysisResult;
use crate::types::{AnalysisEndpoint, FetchError};

const USER_AGENT: &str = concat!("mrp-client/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the external analysis endpoint
pub struct HttpAnalysisClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn analysis_url(&self, protocol_id: Uuid) -> String {
        format!(
            "{}/api/v1/protocols/{}/analysis",
            self.base_url.trim_end_matches('/'),
            protocol_id
        )
    }
}

#[async_trait]
impl AnalysisEndpoint for HttpAnalysisClient {
    async fn fetch_analysis(&self, protocol_id: Uuid) -> Result<AnalysisResult, FetchError> {
        let url = self.analysis_url(protocol_id);
        tracing::debug!(protocol = %protocol_id, url = %url, "Querying analysis endpoint");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let result: AnalysisResult = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            protocol = %protocol_id,
            sample_size = result.summary.sample_size,
            patterns = result.patterns.len(),
            "Retrieved analysis result"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpAnalysisClient::new("https://api.example.org", Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_analysis_url_format() {
        let client =
            HttpAnalysisClient::new("https://api.example.org/", Duration::from_secs(30)).unwrap();
        let protocol = Uuid::nil();
        assert_eq!(
            client.analysis_url(protocol),
            format!("https://api.example.org/api/v1/protocols/{protocol}/analysis")
        );
    }
}
