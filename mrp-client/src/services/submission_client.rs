//! HTTP submission endpoint client
//!
//! Streams the attachment in chunks so transfer progress can be reported as
//! bytes leave the client, and carries the stable request id in a header
//! for server-side deduplication of retried attempts.

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

use crate::types::{
    ProgressReporter, SubmissionAck, SubmissionEndpoint, SubmissionRequest, SubmitError,
};

const USER_AGENT: &str = concat!("mrp-client/", env!("CARGO_PKG_VERSION"));

/// Header carrying the idempotency key for one logical upload
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Attachment bytes are streamed in chunks of this size
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// HTTP client for the external submission endpoint
pub struct HttpSubmissionClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSubmissionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn submit_url(&self) -> String {
        format!(
            "{}/api/v1/data-points",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SubmissionEndpoint for HttpSubmissionClient {
    async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: &ProgressReporter,
    ) -> Result<SubmissionAck, SubmitError> {
        let url = self.submit_url();
        let payload = serde_json::to_string(&request.data_point)
            .map_err(|e| SubmitError::Network(format!("serialize data point: {e}")))?;

        let data_part = reqwest::multipart::Part::text(payload)
            .mime_str("application/json")
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new().part("data_point", data_part);

        if let Some(attachment) = &request.attachment {
            let total = attachment.bytes.len() as u64;
            let chunks: Vec<Vec<u8>> = attachment
                .bytes
                .chunks(UPLOAD_CHUNK_BYTES)
                .map(|chunk| chunk.to_vec())
                .collect();
            let reporter = progress.clone();
            let stream = futures::stream::iter(chunks).scan(0u64, move |sent, chunk| {
                *sent += chunk.len() as u64;
                reporter.report(*sent, total);
                futures::future::ready(Some(Ok::<Vec<u8>, std::io::Error>(chunk)))
            });

            let part = reqwest::multipart::Part::stream_with_length(
                reqwest::Body::wrap_stream(stream),
                total,
            )
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)
            .map_err(|e| SubmitError::Network(e.to_string()))?;
            form = form.part("attachment", part);
        }

        tracing::debug!(
            data_point = %request.data_point.id,
            request_id = %request.request_id,
            url = %url,
            "Submitting data point"
        );

        let response = self
            .http_client
            .post(&url)
            .header(REQUEST_ID_HEADER, request.request_id.to_string())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmitError::Timeout
                } else {
                    SubmitError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SubmitError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let ack: SubmissionAck = response
            .json()
            .await
            .map_err(|e| SubmitError::Network(format!("decode acknowledgment: {e}")))?;
        progress.complete();

        tracing::info!(
            data_point = %request.data_point.id,
            request_id = %request.request_id,
            "Data point acknowledged by submission endpoint"
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client =
            HttpSubmissionClient::new("https://api.example.org", Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_submit_url_strips_trailing_slash() {
        let client =
            HttpSubmissionClient::new("https://api.example.org/", Duration::from_secs(30))
                .unwrap();
        assert_eq!(client.submit_url(), "https://api.example.org/api/v1/data-points");
    }
}
