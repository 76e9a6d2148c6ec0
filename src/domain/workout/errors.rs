//! Workout-specific error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// A scraped dictionary could not be turned into a workout record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    #[error("Scraped workout must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("Scraped workout is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Scraped workout key '{key}' is invalid: {reason}")]
    InvalidField { key: &'static str, reason: String },

    #[error("Scraped workout has an invalid timestamp: {0}")]
    InvalidTimestamp(#[from] ValidationError),
}

impl MalformedInputError {
    /// The offending key, when the failure is attributable to one.
    pub fn key(&self) -> Option<&str> {
        match self {
            MalformedInputError::NotAnObject(_) => None,
            MalformedInputError::MissingKey(key) => Some(*key),
            MalformedInputError::InvalidField { key, .. } => Some(*key),
            MalformedInputError::InvalidTimestamp(ValidationError::InvalidFormat {
                field, ..
            }) => Some(field.as_str()),
        }
    }
}

impl From<MalformedInputError> for DomainError {
    fn from(err: MalformedInputError) -> Self {
        let key = err.key().map(str::to_string);
        let domain = DomainError::new(ErrorCode::MalformedInput, err.to_string());
        match key {
            Some(key) => domain.with_detail("key", key),
            None => domain,
        }
    }
}
