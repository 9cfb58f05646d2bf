use thiserror::Error;

use super::run_error::ChainError;

/// Core domain errors
///
/// These are infrastructure or contract failures. The chain runner never
/// turns them into a persisted run error; they surface as a failed run task.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Queue error: {message}")]
    Queue { message: String },

    /// A chain error that must not be recovered as data
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_error::RunErrorCode;

    #[test]
    fn test_storage_error() {
        let error = DomainError::storage("connection refused");
        assert_eq!(error.to_string(), "Storage error: connection refused");
    }

    #[test]
    fn test_queue_error() {
        let error = DomainError::queue("Job queue is closed");
        assert_eq!(error.to_string(), "Queue error: Job queue is closed");
    }

    #[test]
    fn test_chain_error_is_wrapped() {
        let error: DomainError = ChainError::unsupported_response_type("array").into();

        match error {
            DomainError::Chain(inner) => {
                assert_eq!(inner.code(), RunErrorCode::UnsupportedProviderResponseTypeError)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
