//! Object Storage Port - remote blob storage interface.
//!
//! The archival uploader depends on this trait; adapters (S3, in-memory)
//! provide the implementation. Clients are constructed once at startup and
//! injected, never created at module load.

use async_trait::async_trait;
use thiserror::Error;

/// Port for writing whole objects to a bucket-like store.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns `ArchivalUploadError` on network or service failure.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ArchivalUploadError>;

    /// Human-readable destination for logs, e.g. `s3://bucket`.
    fn describe(&self) -> String;
}

/// Failure while backing up a scrape batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchivalUploadError {
    #[error("Failed to encode archive: {0}")]
    Encoding(String),

    #[error("Upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    #[error("Upload of '{key}' timed out after {secs}s")]
    Timeout { key: String, secs: u64 },
}

impl ArchivalUploadError {
    /// Creates an upload error.
    pub fn upload(key: impl Into<String>, message: impl Into<String>) -> Self {
        ArchivalUploadError::Upload {
            key: key.into(),
            message: message.into(),
        }
    }
}
