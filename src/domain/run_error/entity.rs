use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RunErrorCode, RunErrorDetails};

/// Kind of record a run error hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorableType {
    DocumentLog,
    EvaluationResult,
}

impl ErrorableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentLog => "document_log",
            Self::EvaluationResult => "evaluation_result",
        }
    }
}

impl std::fmt::Display for ErrorableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Correlates a run error with the future log record of the same run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Errorable {
    pub errorable_type: ErrorableType,
    pub errorable_uuid: Uuid,
}

impl Errorable {
    pub fn new(errorable_type: ErrorableType, errorable_uuid: Uuid) -> Self {
        Self {
            errorable_type,
            errorable_uuid,
        }
    }
}

/// Persisted run error row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub id: i64,
    pub errorable_uuid: Uuid,
    pub errorable_type: ErrorableType,
    pub code: RunErrorCode,
    pub message: String,
    pub details: Option<RunErrorDetails>,
    pub created_at: DateTime<Utc>,
}

/// Run error waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunError {
    pub errorable: Errorable,
    pub code: RunErrorCode,
    pub message: String,
    pub details: Option<RunErrorDetails>,
}

impl NewRunError {
    pub fn new(errorable: Errorable, code: RunErrorCode, message: impl Into<String>) -> Self {
        Self {
            errorable,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<RunErrorDetails>) -> Self {
        self.details = details;
        self
    }

    pub fn from_chain_error(errorable: Errorable, error: &super::ChainError) -> Self {
        Self::new(errorable, error.code(), error.message())
            .with_details(error.details().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_error::ChainError;

    #[test]
    fn test_from_chain_error_copies_code_and_details() {
        let errorable = Errorable::new(ErrorableType::DocumentLog, Uuid::new_v4());
        let error = ChainError::chain_compile("unknown-tag", "Unknown tag: 'ref'");

        let new_error = NewRunError::from_chain_error(errorable, &error);

        assert_eq!(new_error.code, RunErrorCode::ChainCompileError);
        assert_eq!(new_error.message, "Error validating chain");
        assert!(new_error.details.is_some());
        assert_eq!(new_error.errorable, errorable);
    }

    #[test]
    fn test_errorable_type_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorableType::EvaluationResult).unwrap();
        assert_eq!(json, "\"evaluation_result\"");
    }
}
