use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable error codes persisted with every run error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunErrorCode {
    #[serde(rename = "unknown_error")]
    Unknown,
    #[serde(rename = "default_provider_exceeded_quota_error")]
    DefaultProviderExceededQuota,
    #[serde(rename = "document_config_error")]
    DocumentConfigError,
    #[serde(rename = "missing_provider_error")]
    MissingProvider,
    #[serde(rename = "chain_compile_error")]
    ChainCompileError,
    #[serde(rename = "ai_run_error")]
    AiRunError,
    #[serde(rename = "unsupported_provider_response_type_error")]
    UnsupportedProviderResponseTypeError,
    #[serde(rename = "ai_provider_config_error")]
    AiProviderConfigError,
}

impl RunErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown_error",
            Self::DefaultProviderExceededQuota => "default_provider_exceeded_quota_error",
            Self::DocumentConfigError => "document_config_error",
            Self::MissingProvider => "missing_provider_error",
            Self::ChainCompileError => "chain_compile_error",
            Self::AiRunError => "ai_run_error",
            Self::UnsupportedProviderResponseTypeError => {
                "unsupported_provider_response_type_error"
            }
            Self::AiProviderConfigError => "ai_provider_config_error",
        }
    }

    /// Adapter contract violations are never recovered as run data
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedProviderResponseTypeError)
    }
}

impl std::fmt::Display for RunErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown_error" => Ok(Self::Unknown),
            "default_provider_exceeded_quota_error" => Ok(Self::DefaultProviderExceededQuota),
            "document_config_error" => Ok(Self::DocumentConfigError),
            "missing_provider_error" => Ok(Self::MissingProvider),
            "chain_compile_error" => Ok(Self::ChainCompileError),
            "ai_run_error" => Ok(Self::AiRunError),
            "unsupported_provider_response_type_error" => {
                Ok(Self::UnsupportedProviderResponseTypeError)
            }
            "ai_provider_config_error" => Ok(Self::AiProviderConfigError),
            other => Err(format!("Unknown run error code: {}", other)),
        }
    }
}

/// Structured payload attached to some error codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunErrorDetails {
    ChainCompile {
        compile_code: String,
        message: String,
    },
}
