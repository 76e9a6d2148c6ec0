//! Object storage configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// S3-compatible bucket that receives scrape archives
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket name
    pub bucket: String,

    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (MinIO, LocalStack, R2)
    pub endpoint_url: Option<String>,

    /// Use path-style addressing instead of virtual-hosted buckets
    #[serde(default)]
    pub force_path_style: bool,

    /// Access key id
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: SecretString,
}

impl StorageConfig {
    /// Expose the secret key for client construction
    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bucket.is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__BUCKET"));
        }
        if self.access_key_id.is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__ACCESS_KEY_ID"));
        }
        if self.secret_access_key().is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__SECRET_ACCESS_KEY"));
        }
        if let Some(endpoint) = &self.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ValidationError::InvalidStorageEndpoint);
            }
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: String::new(),
            secret_access_key: SecretString::new(String::new()),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
