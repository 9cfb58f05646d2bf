use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::http_client::HttpClientTrait;
use super::sse::{translate, SseEvent, SseTranslator, TranslatedEvents};
use crate::domain::llm::{
    AiProvider, AiRequest, AiStream, AiStreamEvent, FinishReason, Message, MessageRole,
    OutputMode, ProviderCallError, ToolCall, Usage,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const GOOGLE_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const AZURE_API_VERSION: &str = "2024-10-21";

/// How the API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiAuth {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure deployments)
    ApiKeyHeader,
}

/// Provider speaking the OpenAI chat completions protocol
///
/// Serves OpenAI itself plus every vendor exposing a compatible endpoint.
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    name: &'static str,
    auth: OpenAiAuth,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let api_key = api_key.into();

        Self {
            client,
            name: "openai",
            auth: OpenAiAuth::Bearer,
            auth_header: format!("Bearer {}", api_key),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Azure OpenAI: `base_url` is the deployment endpoint
    pub fn azure(client: C, api_key: impl Into<String>, deployment_url: impl Into<String>) -> Self {
        Self {
            auth: OpenAiAuth::ApiKeyHeader,
            auth_header: api_key.into(),
            ..Self::with_base_url(client, "", deployment_url).named("azure")
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    fn chat_completions_url(&self) -> String {
        match self.auth {
            OpenAiAuth::Bearer => format!("{}/chat/completions", self.base_url),
            OpenAiAuth::ApiKeyHeader => format!(
                "{}/chat/completions?api-version={}",
                self.base_url, AZURE_API_VERSION
            ),
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let auth = match self.auth {
            OpenAiAuth::Bearer => ("Authorization", self.auth_header.as_str()),
            OpenAiAuth::ApiKeyHeader => ("api-key", self.auth_header.as_str()),
        };

        vec![auth, ("Content-Type", "application/json")]
    }

    fn build_request(&self, request: &AiRequest) -> Value {
        let messages: Vec<OpenAiMessage> =
            request.messages.iter().map(OpenAiMessage::from_domain).collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        match &request.output {
            OutputMode::Text => {}
            OutputMode::Object { schema: Some(schema) } => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "response",
                        "schema": schema,
                    }
                });
            }
            OutputMode::Object { schema: None } => {
                body["response_format"] = json!({"type": "json_object"});
            }
        }

        body
    }
}

#[async_trait]
impl<C: HttpClientTrait> AiProvider for OpenAiProvider<C> {
    async fn stream(&self, request: &AiRequest) -> Result<AiStream, ProviderCallError> {
        let url = self.chat_completions_url();
        let body = self.build_request(request);
        let bytes = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        Ok(translate(bytes, OpenAiStreamState::default()))
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles the chunked OpenAI stream
#[derive(Debug, Default)]
struct OpenAiStreamState {
    tool_calls: BTreeMap<usize, PendingToolCall>,
    finish_reason: Option<FinishReason>,
    finished: bool,
}

impl OpenAiStreamState {
    fn finish(&mut self) -> TranslatedEvents {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events: TranslatedEvents = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or(Value::String(call.arguments))
                };

                Ok(AiStreamEvent::ToolCall(ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments,
                }))
            })
            .collect();

        if let Some(finish_reason) = self.finish_reason {
            events.push(Ok(AiStreamEvent::Finish { finish_reason }));
        }

        events
    }
}

impl SseTranslator for OpenAiStreamState {
    fn on_event(&mut self, event: SseEvent) -> TranslatedEvents {
        if event.data.trim() == "[DONE]" {
            return self.finish();
        }

        let chunk: OpenAiStreamChunk = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(e) => {
                return vec![Err(ProviderCallError::other(format!(
                    "Failed to parse stream chunk: {}",
                    e
                )))];
            }
        };

        if let Some(error) = chunk.error {
            return vec![Ok(AiStreamEvent::Error(ProviderCallError::api_call(
                None,
                error.message,
            )))];
        }

        let mut events = Vec::new();

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(Ok(AiStreamEvent::TextDelta(content)));
                }
            }

            for delta in choice.delta.tool_calls {
                let pending = self.tool_calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    pending.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        pending.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        pending.arguments.push_str(&arguments);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(parse_finish_reason(&reason));
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(Ok(AiStreamEvent::Usage(Usage::new(
                usage.prompt_tokens,
                usage.completion_tokens,
            ))));
        }

        events
    }

    fn on_end(&mut self) -> TranslatedEvents {
        self.finish()
    }
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn from_domain(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        Self {
            role,
            content: message.content.clone(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
