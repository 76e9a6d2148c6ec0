//! GraphQL error mapping.
//!
//! Every error surfaced to clients carries `extensions.code` with the
//! domain error code, plus any structured details.

use async_graphql::ErrorExtensions;

use crate::application::ContextError;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::workout::MalformedInputError;

use super::resolver::ArgumentRenameError;

impl ErrorExtensions for DomainError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.message.clone()).extend_with(|_, ext| {
            ext.set("code", self.code.to_string());
            for (key, value) in &self.details {
                ext.set(key.as_str(), value.clone());
            }
        })
    }
}

impl ErrorExtensions for ContextError {
    fn extend(&self) -> async_graphql::Error {
        match self {
            ContextError::Closed(request_id) => DomainError::new(
                ErrorCode::ContextClosed,
                self.to_string(),
            )
            .with_detail("request_id", request_id.to_string())
            .extend(),
            ContextError::Store(inner) => inner.extend(),
        }
    }
}

impl ErrorExtensions for MalformedInputError {
    fn extend(&self) -> async_graphql::Error {
        DomainError::from(self.clone()).extend()
    }
}

impl ErrorExtensions for ArgumentRenameError {
    fn extend(&self) -> async_graphql::Error {
        DomainError::new(ErrorCode::ArgumentRename, self.to_string()).extend()
    }
}

/// Shorthand for a coded client error.
pub(crate) fn coded(code: ErrorCode, message: impl Into<String>) -> async_graphql::Error {
    DomainError::new(code, message).extend()
}
