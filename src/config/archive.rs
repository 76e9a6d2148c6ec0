//! Archive configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// What to do when an archive upload fails
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicyKind {
    /// One attempt; failures are logged and dropped
    #[default]
    Log,
    /// Bounded retries with exponential backoff, then logged and dropped
    Retry,
}

/// Archival uploader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Upload scrape batches after ingest
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Failure handling
    #[serde(default)]
    pub failure_policy: FailurePolicyKind,

    /// Attempts under the retry policy
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each subsequent one
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Per-attempt upload timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

impl ArchiveConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Validate archive configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_policy == FailurePolicyKind::Retry
            && (self.max_attempts == 0 || self.max_attempts > 10)
        {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if self.upload_timeout_secs == 0 || self.upload_timeout_secs > 600 {
            return Err(ValidationError::InvalidUploadTimeout);
        }
        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            failure_policy: FailurePolicyKind::default(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_upload_timeout() -> u64 {
    30
}
