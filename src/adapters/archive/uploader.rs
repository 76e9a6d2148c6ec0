//! Archival uploader.
//!
//! Backs up each raw scrape batch as one Parquet object named
//! `{timestamp}.parquet`. Backups are best effort: whatever happens, the
//! caller gets an [`ArchiveOutcome`] back, never an error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{ArchiveConfig, FailurePolicyKind};
use crate::ports::{ArchivalUploadError, ObjectStorage};

use super::parquet_encoder::{encode_batch, PARQUET_CONTENT_TYPE};

/// How upload failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFailurePolicy {
    /// Single attempt, failure logged and dropped.
    #[default]
    Log,
    /// Up to `max_attempts` attempts, sleeping `initial_backoff * 2^n`
    /// between them.
    Retry {
        max_attempts: u32,
        initial_backoff: Duration,
    },
}

impl ArchiveFailurePolicy {
    fn max_attempts(&self) -> u32 {
        match self {
            ArchiveFailurePolicy::Log => 1,
            ArchiveFailurePolicy::Retry { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    fn backoff_before(&self, attempt: u32) -> Duration {
        match self {
            ArchiveFailurePolicy::Log => Duration::ZERO,
            ArchiveFailurePolicy::Retry {
                initial_backoff, ..
            } => initial_backoff.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(2))),
        }
    }
}

impl From<&ArchiveConfig> for ArchiveFailurePolicy {
    fn from(config: &ArchiveConfig) -> Self {
        match config.failure_policy {
            FailurePolicyKind::Log => ArchiveFailurePolicy::Log,
            FailurePolicyKind::Retry => ArchiveFailurePolicy::Retry {
                max_attempts: config.max_attempts,
                initial_backoff: config.initial_backoff(),
            },
        }
    }
}

/// Result of one backup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Uploaded {
        key: String,
        bytes: usize,
        attempts: u32,
        /// Hex SHA-256 of the uploaded object.
        sha256: String,
    },
    Failed {
        key: String,
        error: ArchivalUploadError,
        attempts: u32,
    },
}

impl ArchiveOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, ArchiveOutcome::Uploaded { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            ArchiveOutcome::Uploaded { key, .. } | ArchiveOutcome::Failed { key, .. } => key,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ArchiveOutcome::Uploaded { attempts, .. }
            | ArchiveOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Serializes scrape batches to Parquet and uploads them.
#[derive(Clone)]
pub struct ArchivalUploader {
    storage: Arc<dyn ObjectStorage>,
    policy: ArchiveFailurePolicy,
    upload_timeout: Duration,
}

impl ArchivalUploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        policy: ArchiveFailurePolicy,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            policy,
            upload_timeout,
        }
    }

    pub fn from_config(storage: Arc<dyn ObjectStorage>, config: &ArchiveConfig) -> Self {
        Self::new(storage, config.into(), config.upload_timeout())
    }

    pub fn policy(&self) -> ArchiveFailurePolicy {
        self.policy
    }

    /// Object key for a batch labelled `timestamp`.
    pub fn object_key(timestamp: &str) -> String {
        format!("{}.parquet", timestamp)
    }

    /// Backs up `batch` under `{timestamp}.parquet`.
    ///
    /// Never fails: encoding and upload errors are logged and reported in
    /// the returned outcome.
    pub async fn backup(&self, batch: &[Value], timestamp: &str) -> ArchiveOutcome {
        let key = Self::object_key(timestamp);

        let body = match encode_batch(batch) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(key = %key, error = %error, "Failed to encode scrape archive");
                return ArchiveOutcome::Failed {
                    key,
                    error,
                    attempts: 0,
                };
            }
        };

        let sha256 = format!("{:x}", Sha256::digest(&body));
        let bytes = body.len();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff_before(attempt)).await;
            }

            match self.upload_once(&key, body.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        key = %key,
                        bytes,
                        rows = batch.len(),
                        attempts = attempt,
                        destination = %self.storage.describe(),
                        "Archived scrape batch"
                    );
                    return ArchiveOutcome::Uploaded {
                        key,
                        bytes,
                        attempts: attempt,
                        sha256,
                    };
                }
                Err(error) if attempt < max_attempts => {
                    tracing::warn!(
                        key = %key,
                        attempt,
                        max_attempts,
                        error = %error,
                        "Archive upload failed, retrying"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        key = %key,
                        attempts = attempt,
                        error = %error,
                        "Archive upload failed, giving up"
                    );
                    return ArchiveOutcome::Failed {
                        key,
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
    }

    async fn upload_once(&self, key: &str, body: Vec<u8>) -> Result<(), ArchivalUploadError> {
        match tokio::time::timeout(
            self.upload_timeout,
            self.storage.put_object(key, body, PARQUET_CONTENT_TYPE),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ArchivalUploadError::Timeout {
                key: key.to_string(),
                secs: self.upload_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryObjectStorage;
    use async_trait::async_trait;
    use serde_json::json;

    fn uploader(storage: &InMemoryObjectStorage, policy: ArchiveFailurePolicy) -> ArchivalUploader {
        ArchivalUploader::new(Arc::new(storage.clone()), policy, Duration::from_secs(5))
    }

    fn retry(max_attempts: u32) -> ArchiveFailurePolicy {
        ArchiveFailurePolicy::Retry {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn yoga() -> Value {
        json!({
            "id": 42,
            "title": "Yoga",
            "location": "Gym A",
            "time": "2024-01-01T10:00:00+00:00",
            "duration": 60,
            "available": 5,
            "timestamp": "2024-01-01T09:00:00+00:00"
        })
    }

    // A bucket that never answers.
    struct HangingStorage;

    #[async_trait]
    impl ObjectStorage for HangingStorage {
        async fn put_object(&self, _: &str, _: Vec<u8>, _: &str) -> Result<(), ArchivalUploadError> {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "hanging://".to_string()
        }
    }

    #[test]
    fn key_is_timestamp_with_parquet_suffix() {
        assert_eq!(
            ArchivalUploader::object_key("2024-01-01T09:00:00"),
            "2024-01-01T09:00:00.parquet"
        );
    }

    #[test]
    fn backoff_doubles_between_retries() {
        let policy = ArchiveFailurePolicy::Retry {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_before(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_before(3), Duration::from_millis(200));
        assert_eq!(policy.backoff_before(4), Duration::from_millis(400));
    }

    #[test]
    fn policy_from_config() {
        let config = ArchiveConfig {
            failure_policy: FailurePolicyKind::Retry,
            max_attempts: 5,
            initial_backoff_ms: 50,
            ..Default::default()
        };
        assert_eq!(
            ArchiveFailurePolicy::from(&config),
            ArchiveFailurePolicy::Retry {
                max_attempts: 5,
                initial_backoff: Duration::from_millis(50),
            }
        );
        assert_eq!(
            ArchiveFailurePolicy::from(&ArchiveConfig::default()),
            ArchiveFailurePolicy::Log
        );
    }

    #[tokio::test]
    async fn uploads_batch_under_timestamp_key() {
        let storage = InMemoryObjectStorage::new();
        let outcome = uploader(&storage, ArchiveFailurePolicy::Log)
            .backup(&[yoga()], "2024-01-01T09:00:00")
            .await;

        assert!(outcome.is_uploaded());
        assert_eq!(outcome.key(), "2024-01-01T09:00:00.parquet");

        let stored = storage.get("2024-01-01T09:00:00.parquet").await.unwrap();
        assert_eq!(stored.content_type, PARQUET_CONTENT_TYPE);
        match outcome {
            ArchiveOutcome::Uploaded { bytes, sha256, .. } => {
                assert_eq!(bytes, stored.body.len());
                assert_eq!(sha256, format!("{:x}", Sha256::digest(&stored.body)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_batch_uploads_zero_row_object() {
        let storage = InMemoryObjectStorage::new();
        let outcome = uploader(&storage, ArchiveFailurePolicy::Log)
            .backup(&[], "empty")
            .await;

        assert!(outcome.is_uploaded());
        let stored = storage.get("empty.parquet").await.unwrap();
        assert!(stored.body.starts_with(b"PAR1"));
    }

    #[tokio::test]
    async fn failure_is_swallowed_under_log_policy() {
        let storage = InMemoryObjectStorage::failing(1);
        let outcome = uploader(&storage, ArchiveFailurePolicy::Log)
            .backup(&[yoga()], "t1")
            .await;

        assert!(!outcome.is_uploaded());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(storage.attempts(), 1);
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn retry_policy_recovers_from_transient_failure() {
        let storage = InMemoryObjectStorage::failing(2);
        let outcome = uploader(&storage, retry(3)).backup(&[yoga()], "t2").await;

        assert!(outcome.is_uploaded());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(storage.attempts(), 3);
    }

    #[tokio::test]
    async fn retry_policy_stops_at_bound() {
        let storage = InMemoryObjectStorage::failing(10);
        let outcome = uploader(&storage, retry(4)).backup(&[yoga()], "t3").await;

        assert!(!outcome.is_uploaded());
        assert_eq!(outcome.attempts(), 4);
        assert_eq!(storage.attempts(), 4);
    }

    #[tokio::test]
    async fn encoding_failure_is_reported_not_raised() {
        let storage = InMemoryObjectStorage::new();
        let outcome = uploader(&storage, ArchiveFailurePolicy::Log)
            .backup(&[json!("not an object")], "bad")
            .await;

        assert!(matches!(
            outcome,
            ArchiveOutcome::Failed {
                error: ArchivalUploadError::Encoding(_),
                attempts: 0,
                ..
            }
        ));
        assert_eq!(storage.attempts(), 0);
    }

    #[tokio::test]
    async fn hung_upload_times_out() {
        let uploader = ArchivalUploader::new(
            Arc::new(HangingStorage),
            ArchiveFailurePolicy::Log,
            Duration::from_millis(20),
        );
        let outcome = uploader.backup(&[yoga()], "slow").await;

        assert!(matches!(
            outcome,
            ArchiveOutcome::Failed {
                error: ArchivalUploadError::Timeout { .. },
                ..
            }
        ));
    }
}
