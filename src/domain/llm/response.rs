use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProviderCallError;

/// Reason why the generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content-filter",
            Self::ToolCalls => "tool-calls",
            Self::Error => "error",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One event of a provider's full stream
#[derive(Debug, Clone)]
pub enum AiStreamEvent {
    TextDelta(String),
    ToolCall(ToolCall),
    Usage(Usage),
    Finish { finish_reason: FinishReason },
    Error(ProviderCallError),
}

/// Tag of the response variant a call produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Text,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOutput {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectOutput {
    /// `None` when the provider text was not valid JSON
    pub object: Option<Value>,
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
}

/// Aggregated result of a fully consumed provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum AiResult {
    Text(TextOutput),
    Object(ObjectOutput),
}

impl AiResult {
    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Text(_) => StreamType::Text,
            Self::Object(_) => StreamType::Object,
        }
    }

    pub fn usage(&self) -> Usage {
        match self {
            Self::Text(output) => output.usage,
            Self::Object(output) => output.usage,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text(output) => &output.text,
            Self::Object(output) => &output.text,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Text(output) => &output.tool_calls,
            Self::Object(output) => &output.tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_calculation() {
        let usage = Usage::new(3, 7);
        assert_eq!(usage.total_tokens, 10);
    }

    #[test]
    fn test_finish_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&FinishReason::ToolCalls).unwrap();
        assert_eq!(json, "\"tool-calls\"");
        assert_eq!(FinishReason::ContentFilter.as_str(), "content-filter");
    }

    #[test]
    fn test_ai_result_accessors() {
        let result = AiResult::Text(TextOutput {
            text: "Hello".to_string(),
            usage: Usage::new(1, 2),
            tool_calls: vec![],
        });

        assert_eq!(result.stream_type(), StreamType::Text);
        assert_eq!(result.text(), "Hello");
        assert_eq!(result.usage().total_tokens, 3);
    }
}
