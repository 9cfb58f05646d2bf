use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::llm::{FinishReason, StreamType};
use crate::domain::provider_log::{ProviderLog, ProviderLogData};
use crate::domain::run_error::RunErrorCode;
use crate::domain::runs::EvaluationResult;
use crate::domain::workspace::LogSources;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRunData {
    pub workspace_id: i64,
    pub document_uuid: Uuid,
    pub commit_uuid: Uuid,
    pub document_log_uuid: Uuid,
    pub parameters: Map<String, Value>,
    pub resolved_content: String,
    pub duration_ms: u64,
    pub source: LogSources,
    /// Set when the run settled with an error
    pub error_code: Option<RunErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRunData {
    pub workspace_id: i64,
    pub evaluation_id: i64,
    pub document_uuid: Uuid,
    pub document_log_uuid: Uuid,
    pub provider_log_uuid: Option<Uuid>,
    pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResultCreatedData {
    pub workspace_id: i64,
    pub evaluation_result: EvaluationResult,
}

/// Events emitted by the run pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    AiProviderCallCompleted {
        log: ProviderLogData,
        stream_type: StreamType,
        finish_reason: FinishReason,
    },
    ProviderLogCreated(ProviderLog),
    DocumentRun(DocumentRunData),
    EvaluationRun(EvaluationRunData),
    EvaluationResultCreated(EvaluationResultCreatedData),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AiProviderCallCompleted { .. } => "aiProviderCallCompleted",
            Self::ProviderLogCreated(_) => "providerLogCreated",
            Self::DocumentRun(_) => "documentRun",
            Self::EvaluationRun(_) => "evaluationRun",
            Self::EvaluationResultCreated(_) => "evaluationResultCreated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider_log::fixtures::provider_log_data;

    #[test]
    fn test_event_is_tagged_by_name() {
        let event = Event::AiProviderCallCompleted {
            log: provider_log_data(),
            stream_type: StreamType::Text,
            finish_reason: FinishReason::Stop,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
        assert_eq!(json["data"]["stream_type"], "text");
        assert_eq!(json["data"]["finish_reason"], "stop");
    }
}
