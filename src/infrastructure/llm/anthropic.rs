use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::http_client::HttpClientTrait;
use super::sse::{translate, SseEvent, SseTranslator, TranslatedEvents};
use crate::domain::llm::{
    AiProvider, AiRequest, AiStream, AiStreamEvent, FinishReason, Message, MessageRole,
    OutputMode, ProviderCallError, ToolCall, Usage,
};

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic API provider
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, request: &AiRequest) -> Value {
        let (mut system, messages) = split_system_messages(&request.messages);

        // No native JSON mode; object output is requested in the system prompt
        if let OutputMode::Object { schema } = &request.output {
            let instruction = match schema {
                Some(schema) => format!(
                    "Respond only with a JSON object that matches this JSON schema: {}",
                    schema
                ),
                None => "Respond only with a JSON object.".to_string(),
            };

            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, instruction),
                None => instruction,
            });
        }

        let anthropic_messages: Vec<Value> = messages.iter().map(|m| to_anthropic(m)).collect();

        let mut body = json!({
            "model": request.model,
            "messages": anthropic_messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": true,
        });

        if let Some(system_content) = system {
            body["system"] = json!(system_content);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait> AiProvider for AnthropicProvider<C> {
    async fn stream(&self, request: &AiRequest) -> Result<AiStream, ProviderCallError> {
        let url = self.messages_url();
        let body = self.build_request(request);
        let bytes = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        Ok(translate(bytes, AnthropicStreamState::default()))
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

fn split_system_messages(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system_content = String::new();
    let mut other_messages = Vec::new();

    for msg in messages {
        if msg.role == MessageRole::System {
            if !system_content.is_empty() {
                system_content.push('\n');
            }
            system_content.push_str(&msg.content);
        } else {
            other_messages.push(msg);
        }
    }

    let system = if system_content.is_empty() {
        None
    } else {
        Some(system_content)
    };

    (system, other_messages)
}

fn to_anthropic(message: &Message) -> Value {
    match message.role {
        MessageRole::Tool => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }]
        }),
        MessageRole::Assistant => json!({"role": "assistant", "content": message.content}),
        _ => json!({"role": "user", "content": message.content}),
    }
}

fn parse_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

#[derive(Debug, Default)]
struct PendingToolUse {
    id: String,
    name: String,
    input: String,
}

#[derive(Debug, Default)]
struct AnthropicStreamState {
    input_tokens: u32,
    output_tokens: u32,
    tool_uses: BTreeMap<usize, PendingToolUse>,
    stop_reason: Option<FinishReason>,
    finished: bool,
}

impl AnthropicStreamState {
    fn finish(&mut self) -> TranslatedEvents {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = vec![Ok(AiStreamEvent::Usage(Usage::new(
            self.input_tokens,
            self.output_tokens,
        )))];

        if let Some(finish_reason) = self.stop_reason {
            events.push(Ok(AiStreamEvent::Finish { finish_reason }));
        }

        events
    }
}

impl SseTranslator for AnthropicStreamState {
    fn on_event(&mut self, event: SseEvent) -> TranslatedEvents {
        let parsed: AnthropicStreamEvent = match serde_json::from_str(&event.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                return vec![Err(ProviderCallError::other(format!(
                    "Failed to parse stream event: {}",
                    e
                )))];
            }
        };

        match parsed {
            AnthropicStreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.input_tokens;
                self.output_tokens = message.usage.output_tokens;
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block: ContentBlock::ToolUse { id, name },
            } => {
                self.tool_uses.insert(
                    index,
                    PendingToolUse {
                        id,
                        name,
                        input: String::new(),
                    },
                );
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } if !text.is_empty() => {
                    vec![Ok(AiStreamEvent::TextDelta(text))]
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(pending) = self.tool_uses.get_mut(&index) {
                        pending.input.push_str(&partial_json);
                    }
                    Vec::new()
                }
                _ => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockStop { index } => {
                match self.tool_uses.remove(&index) {
                    Some(tool_use) => {
                        let arguments = if tool_use.input.trim().is_empty() {
                            json!({})
                        } else {
                            serde_json::from_str(&tool_use.input)
                                .unwrap_or(Value::String(tool_use.input))
                        };

                        vec![Ok(AiStreamEvent::ToolCall(ToolCall {
                            id: tool_use.id,
                            name: tool_use.name,
                            arguments,
                        }))]
                    }
                    None => Vec::new(),
                }
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(parse_stop_reason(&reason));
                }
                if let Some(usage) = usage {
                    self.output_tokens = usage.output_tokens;
                }
                Vec::new()
            }
            AnthropicStreamEvent::MessageStop => self.finish(),
            AnthropicStreamEvent::Error { error } => {
                vec![Ok(AiStreamEvent::Error(ProviderCallError::api_call(
                    None,
                    error.message,
                )))]
            }
            AnthropicStreamEvent::ContentBlockStart { .. } | AnthropicStreamEvent::Ping => {
                Vec::new()
            }
        }
    }

    fn on_end(&mut self) -> TranslatedEvents {
        self.finish()
    }
}

// Anthropic streaming API types

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: StartMessage,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        usage: Option<OutputUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicError,
    },
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: StartUsage,
}

#[derive(Debug, Default, Deserialize)]
struct StartUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text,
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputUsage {
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
