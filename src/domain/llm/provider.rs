use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use super::{AiRequest, AiStreamEvent};
use crate::domain::provider::ProviderApiKey;
use crate::domain::run_error::ChainError;

/// Full event stream of one provider call
pub type AiStream = Pin<Box<dyn Stream<Item = Result<AiStreamEvent, ProviderCallError>> + Send>>;

/// Failure raised by a provider adapter
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderCallError {
    /// The provider API answered with a structured error
    #[error("{message}")]
    ApiCall {
        status: Option<u16>,
        message: String,
        response_body: Option<String>,
    },

    #[error("{0}")]
    Other(String),
}

impl ProviderCallError {
    pub fn api_call(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ApiCall {
            status,
            message: message.into(),
            response_body: None,
        }
    }

    pub fn with_response_body(self, body: impl Into<String>) -> Self {
        match self {
            Self::ApiCall {
                status, message, ..
            } => Self::ApiCall {
                status,
                message,
                response_body: Some(body.into()),
            },
            other => other,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<ProviderCallError> for ChainError {
    fn from(error: ProviderCallError) -> Self {
        match error {
            ProviderCallError::ApiCall {
                message,
                response_body: Some(body),
                ..
            } => ChainError::ai_run(format!(
                "Error: {} and response body: {}",
                message, body
            )),
            ProviderCallError::ApiCall { message, .. } => ChainError::ai_run(message),
            ProviderCallError::Other(message) => {
                ChainError::ai_run(format!("Unknown error: {}", message))
            }
        }
    }
}

/// Streaming adapter for one AI provider account
#[async_trait]
pub trait AiProvider: Send + Sync + Debug {
    /// Opens a streaming completion
    async fn stream(&self, request: &AiRequest) -> Result<AiStream, ProviderCallError>;

    fn provider_name(&self) -> &'static str;
}

/// Builds adapters from stored provider credentials
pub trait AiProviderFactory: Send + Sync + Debug {
    fn create(&self, provider: &ProviderApiKey) -> Result<Arc<dyn AiProvider>, ChainError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_error::RunErrorCode;

    #[test]
    fn test_api_call_error_keeps_provider_message() {
        let error: ChainError = ProviderCallError::api_call(Some(429), "Rate limit reached").into();

        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert_eq!(error.message(), "Rate limit reached");
    }

    #[test]
    fn test_api_call_error_with_body() {
        let error: ChainError = ProviderCallError::api_call(Some(500), "API call error")
            .with_response_body("[RESPONSE_BODY]")
            .into();

        assert_eq!(
            error.message(),
            "Error: API call error and response body: [RESPONSE_BODY]"
        );
    }

    #[test]
    fn test_other_error_is_unknown_ai_error() {
        let error: ChainError = ProviderCallError::other("something weird").into();

        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert_eq!(error.message(), "Unknown error: something weird");
    }
}
