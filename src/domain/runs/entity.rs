use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::domain::chain::CompiledPrompt;
use crate::domain::workspace::LogSources;

/// Record of one document execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLog {
    pub id: i64,
    pub uuid: Uuid,
    pub document_uuid: Uuid,
    pub commit_uuid: Uuid,
    pub parameters: Map<String, Value>,
    pub resolved_content: String,
    pub duration_ms: u64,
    pub source: LogSources,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocumentLog {
    /// The run's errorable uuid
    pub uuid: Uuid,
    pub document_uuid: Uuid,
    pub commit_uuid: Uuid,
    pub parameters: Map<String, Value>,
    pub resolved_content: String,
    pub duration_ms: u64,
    pub source: LogSources,
}

/// Shape of the value an evaluation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationResultType {
    Boolean,
    Number,
    Text,
}

impl EvaluationResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Text => "text",
        }
    }

    /// JSON schema the provider must answer with
    pub fn response_schema(&self) -> Value {
        let result = match self {
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Number => json!({ "type": "number" }),
            Self::Text => json!({ "type": "string" }),
        };

        json!({
            "type": "object",
            "properties": {
                "result": result,
                "reason": { "type": "string" },
            },
            "required": ["result", "reason"],
        })
    }
}

/// An LLM-judged evaluation of document runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub prompt: CompiledPrompt,
    pub result_type: EvaluationResultType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: i64,
    pub uuid: Uuid,
    pub evaluation_id: i64,
    pub document_log_uuid: Uuid,
    pub provider_log_uuid: Option<Uuid>,
    pub result_type: EvaluationResultType,
    pub result: Option<Value>,
    pub reason: Option<String>,
    pub source: LogSources,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvaluationResult {
    /// The evaluation run's errorable uuid
    pub uuid: Uuid,
    pub evaluation_id: i64,
    pub document_log_uuid: Uuid,
    pub provider_log_uuid: Option<Uuid>,
    pub result_type: EvaluationResultType,
    pub result: Option<Value>,
    pub reason: Option<String>,
    pub source: LogSources,
}
