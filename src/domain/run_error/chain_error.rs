use thiserror::Error;

use super::{RunError, RunErrorCode, RunErrorDetails};
use crate::domain::DomainError;

pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "You have exceeded your maximum number of free runs for today";

pub const MODEL_REQUIRED_MESSAGE: &str = "\"model\" attribute is required. Read more here: https://docs.latitude.so/guides/getting-started/providers#using-providers-in-prompts";

/// A failure surfaced by the chain run pipeline
///
/// Carries a stable code, an optional structured payload and, once the
/// failure has been persisted, the durable [`RunError`] row.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ChainError {
    code: RunErrorCode,
    message: String,
    details: Option<RunErrorDetails>,
    db_error: Option<RunError>,
}

impl ChainError {
    pub fn new(code: RunErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            db_error: None,
        }
    }

    pub fn with_details(mut self, details: RunErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn document_config(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::DocumentConfigError, message)
    }

    pub fn model_required() -> Self {
        Self::document_config(MODEL_REQUIRED_MESSAGE)
    }

    pub fn missing_provider(name: &str) -> Self {
        Self::new(
            RunErrorCode::MissingProvider,
            format!(
                "Provider API Key with name {} not found. Add a provider with that name in the workspace settings.",
                name
            ),
        )
    }

    pub fn ai_provider_config(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::AiProviderConfigError, message)
    }

    pub fn chain_compile(compile_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::ChainCompileError, "Error validating chain").with_details(
            RunErrorDetails::ChainCompile {
                compile_code: compile_code.into(),
                message: message.into(),
            },
        )
    }

    pub fn quota_exceeded() -> Self {
        Self::new(
            RunErrorCode::DefaultProviderExceededQuota,
            QUOTA_EXCEEDED_MESSAGE,
        )
    }

    pub fn ai_run(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::AiRunError, message)
    }

    pub fn unsupported_response_type(kind: &str) -> Self {
        Self::new(
            RunErrorCode::UnsupportedProviderResponseTypeError,
            format!(
                "Invalid stream type {} result is not a textStream or objectStream",
                kind
            ),
        )
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::Unknown, message)
    }

    pub fn code(&self) -> RunErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&RunErrorDetails> {
        self.details.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }

    /// The persisted row, once the error has been stored
    pub fn db_error(&self) -> Option<&RunError> {
        self.db_error.as_ref()
    }

    pub fn attach_db_error(&mut self, error: RunError) {
        self.db_error = Some(error);
    }
}

// Persisted rows are not part of an error's identity
impl PartialEq for ChainError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message && self.details == other.details
    }
}

impl From<DomainError> for ChainError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Chain(inner) => inner,
            other => Self::unknown(other.to_string()),
        }
    }
}
