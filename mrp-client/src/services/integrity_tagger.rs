//! Integrity tagging: content digest, scan, and encryption metadata
//!
//! Runs after schema validation and before upload. On success the data
//! point advances `Validated → Encrypted`; on any failure it is left
//! untouched (still `Validated`) and stays ineligible for upload until the
//! participant resubmits.
//!
//! Check order for an attachment: size cap, declared-type allow-list,
//! byte-sniff agreement, content scan, digest. The digest is SHA-256 over
//! the attachment content, hex encoded, and is stable across re-tagging of
//! the same bytes; `encrypted_at` refreshes on every run.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Attachment, DataPoint, DataPointStatus, EncryptionMetadata, ENCRYPTION_ALGORITHM,
    ENCRYPTION_SCHEMA_VERSION,
};
use crate::types::{ContentScanner, ScanError, ScanVerdict};

/// Integrity tagging errors. All of them are fatal to the submission
/// attempt; the data point stays `Validated`.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Data point {id} is not eligible for tagging (status {status:?})")]
    NotEligible { id: Uuid, status: DataPointStatus },

    #[error("Attachment is {size} bytes, above the {limit} byte limit")]
    AttachmentTooLarge { size: usize, limit: usize },

    #[error("Attachment type {0:?} is not allowed")]
    DisallowedType(String),

    #[error("Attachment bytes do not match declared type {declared:?} (detected {detected:?})")]
    TypeMismatch { declared: String, detected: String },

    #[error("Attachment failed the content scan")]
    InfectedAttachment,

    #[error("Content scan failed: {0}")]
    ScanFailed(#[from] ScanError),

    #[error("Digest computation failed: {0}")]
    Digest(String),
}

/// Integrity tagger
pub struct IntegrityTagger {
    scanner: Arc<dyn ContentScanner>,
    max_attachment_bytes: usize,
    allowed_content_types: Vec<String>,
}

impl IntegrityTagger {
    pub fn new(
        scanner: Arc<dyn ContentScanner>,
        max_attachment_bytes: usize,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            scanner,
            max_attachment_bytes,
            allowed_content_types,
        }
    }

    /// Digest and scan the attachment (when present), then stamp encryption
    /// metadata and advance the data point to `Encrypted`.
    ///
    /// `key_id` identifies the encryption key; key material never passes
    /// through this client.
    pub async fn tag_and_encrypt(
        &self,
        data_point: &mut DataPoint,
        attachment: Option<&Attachment>,
        key_id: &str,
    ) -> Result<(), IntegrityError> {
        match data_point.status() {
            DataPointStatus::Validated | DataPointStatus::Encrypted => {}
            status => {
                return Err(IntegrityError::NotEligible {
                    id: data_point.id,
                    status,
                })
            }
        }

        let content_digest = match attachment {
            Some(attachment) => {
                self.check_attachment(attachment)?;

                match self.scanner.scan(&attachment.bytes).await? {
                    ScanVerdict::Clean => {}
                    ScanVerdict::Infected => {
                        tracing::warn!(
                            data_point = %data_point.id,
                            file_name = %attachment.file_name,
                            "Attachment rejected by content scan"
                        );
                        return Err(IntegrityError::InfectedAttachment);
                    }
                }

                Some(compute_digest(attachment.bytes.clone()).await?)
            }
            None => None,
        };

        let metadata = EncryptionMetadata {
            algorithm: ENCRYPTION_ALGORITHM.to_string(),
            key_id: key_id.to_string(),
            encrypted_at: Utc::now(),
            schema_version: ENCRYPTION_SCHEMA_VERSION.to_string(),
        };

        // Status check above makes this transition infallible
        data_point
            .record_encryption(metadata, content_digest)
            .map_err(|e| IntegrityError::Digest(format!("lifecycle violation: {e}")))?;

        tracing::info!(
            data_point = %data_point.id,
            key_id = %key_id,
            has_attachment = attachment.is_some(),
            sensitive_fields = data_point.sensitive_fields.len(),
            "Data point tagged for upload"
        );
        Ok(())
    }

    fn check_attachment(&self, attachment: &Attachment) -> Result<(), IntegrityError> {
        if attachment.bytes.len() > self.max_attachment_bytes {
            return Err(IntegrityError::AttachmentTooLarge {
                size: attachment.bytes.len(),
                limit: self.max_attachment_bytes,
            });
        }

        if !self
            .allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&attachment.content_type))
        {
            return Err(IntegrityError::DisallowedType(
                attachment.content_type.clone(),
            ));
        }

        // Declared type must agree with the bytes when the format is
        // recognizable; formats infer does not know (e.g. CSV) pass on the
        // declared type alone.
        if let Some(detected) = infer::get(&attachment.bytes) {
            if !detected
                .mime_type()
                .eq_ignore_ascii_case(&attachment.content_type)
            {
                return Err(IntegrityError::TypeMismatch {
                    declared: attachment.content_type.clone(),
                    detected: detected.mime_type().to_string(),
                });
            }
        }

        Ok(())
    }
}

/// SHA-256 of the attachment content, hex encoded.
///
/// CPU-bound, so it runs on the blocking pool.
async fn compute_digest(bytes: Vec<u8>) -> Result<String, IntegrityError> {
    tokio::task::spawn_blocking(move || {
        let mut hasher = Sha256::new();
        for chunk in bytes.chunks(1024 * 1024) {
            hasher.update(chunk);
        }
        format!("{:x}", hasher.finalize())
    })
    .await
    .map_err(|e| IntegrityError::Digest(format!("digest task failed: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
