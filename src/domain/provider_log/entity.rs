use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::llm::{FinishReason, Message, PromptConfig, ToolCall, Usage};
use crate::domain::provider::Providers;
use crate::domain::run_error::{ErrorableType, RunError, RunErrorCode};
use crate::domain::workspace::LogSources;

/// Normalized data of one completed provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLogData {
    pub uuid: Uuid,
    pub generated_at: DateTime<Utc>,
    pub workspace_id: i64,
    pub provider_id: i64,
    pub provider_type: Providers,
    pub model: String,
    pub config: PromptConfig,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub response_object: Option<Value>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    pub duration_ms: u64,
    pub source: LogSources,
    #[serde(default)]
    pub api_key_id: Option<i64>,
    #[serde(default)]
    pub document_log_uuid: Option<Uuid>,
}

/// Failure of the call, linked to the run's errorable record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderErrorLink {
    pub errorable_type: ErrorableType,
    pub errorable_uuid: Uuid,
    pub error_code: RunErrorCode,
    pub message: String,
}

/// Provider log waiting to be persisted
///
/// Also the payload of the create-provider-log background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProviderLog {
    #[serde(flatten)]
    pub data: ProviderLogData,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub cost_in_millicents: Option<u64>,
    #[serde(default)]
    pub provider_error: Option<ProviderErrorLink>,
}

impl NewProviderLog {
    pub fn new(data: ProviderLogData, finish_reason: FinishReason) -> Self {
        Self {
            data,
            finish_reason,
            cost_in_millicents: None,
            provider_error: None,
        }
    }

    pub fn with_cost(mut self, cost_in_millicents: u64) -> Self {
        self.cost_in_millicents = Some(cost_in_millicents);
        self
    }

    pub fn with_provider_error(mut self, provider_error: ProviderErrorLink) -> Self {
        self.provider_error = Some(provider_error);
        self
    }
}

/// Persisted provider log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLog {
    pub id: i64,
    pub uuid: Uuid,
    pub document_log_uuid: Option<Uuid>,
    pub provider_id: i64,
    pub model: String,
    pub config: PromptConfig,
    pub messages: Vec<Message>,
    pub response_text: Option<String>,
    pub response_object: Option<Value>,
    pub tool_calls: Vec<ToolCall>,
    pub tokens: u64,
    pub cost_in_millicents: u64,
    pub duration_ms: u64,
    pub source: LogSources,
    pub api_key_id: Option<i64>,
    pub finish_reason: FinishReason,
    pub error_id: Option<i64>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ProviderLog {
    /// Builds the row inserted for `log`
    pub fn from_new(
        id: i64,
        log: &NewProviderLog,
        cost_in_millicents: u64,
        error_id: Option<i64>,
    ) -> Self {
        let data = &log.data;

        Self {
            id,
            uuid: data.uuid,
            document_log_uuid: data.document_log_uuid,
            provider_id: data.provider_id,
            model: data.model.clone(),
            config: data.config.clone(),
            messages: data.messages.clone(),
            response_text: data.response_text.clone(),
            response_object: data.response_object.clone(),
            tool_calls: data.tool_calls.clone(),
            tokens: data.usage.total_tokens as u64,
            cost_in_millicents,
            duration_ms: data.duration_ms,
            source: data.source,
            api_key_id: data.api_key_id,
            finish_reason: log.finish_reason,
            error_id,
            generated_at: data.generated_at,
            created_at: Utc::now(),
        }
    }
}

/// Result of the transactional provider log write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProviderLog {
    pub provider_log: ProviderLog,
    pub run_error: Option<RunError>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::new_provider_log;
    use super::*;

    #[test]
    fn test_row_takes_total_tokens() {
        let log = new_provider_log();
        let row = ProviderLog::from_new(1, &log, 12, None);

        assert_eq!(row.tokens, 10);
        assert_eq!(row.cost_in_millicents, 12);
        assert_eq!(row.finish_reason, FinishReason::Stop);
        assert_eq!(row.response_text.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_job_payload_round_trips() {
        let log = new_provider_log().with_cost(100);

        let json = serde_json::to_string(&log).unwrap();
        let decoded: NewProviderLog = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, log);
    }
}
