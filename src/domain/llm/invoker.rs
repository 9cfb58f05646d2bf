use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    AiProviderFactory, AiRequest, AiResult, AiStream, Message, ObjectOutput, OutputMode,
    PromptConfig, TextOutput, ToolCall, Usage,
};
use crate::domain::provider::ProviderApiKey;
use crate::domain::run_error::ChainError;

/// An in-flight provider call
pub struct AiCall {
    pub output: OutputMode,
    pub full_stream: AiStream,
}

impl std::fmt::Debug for AiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiCall").field("output", &self.output).finish()
    }
}

/// Issues exactly one streaming call to a provider
#[derive(Debug, Clone)]
pub struct AiInvoker {
    factory: Arc<dyn AiProviderFactory>,
}

impl AiInvoker {
    pub fn new(factory: Arc<dyn AiProviderFactory>) -> Self {
        Self { factory }
    }

    /// Opens the call
    ///
    /// Provider failures come back as `AiRunError`; an output shape other
    /// than text or object comes back as the fatal
    /// `UnsupportedProviderResponseTypeError`.
    pub async fn invoke(
        &self,
        provider: &ProviderApiKey,
        config: &PromptConfig,
        messages: &[Message],
    ) -> Result<AiCall, ChainError> {
        let output = config.output_mode()?;
        let model = config
            .model
            .clone()
            .ok_or_else(ChainError::model_required)?;

        let adapter = self.factory.create(provider)?;
        let request = AiRequest::new(model, messages.to_vec()).with_config(config, output.clone());

        debug!(
            provider = %provider.name,
            adapter = adapter.provider_name(),
            model = %request.model,
            "Invoking AI provider"
        );

        let full_stream = adapter.stream(&request).await.map_err(|e| {
            warn!(provider = %provider.name, error = %e, "AI provider call failed");
            ChainError::from(e)
        })?;

        Ok(AiCall {
            output,
            full_stream,
        })
    }
}

/// Aggregates the events of a full stream
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self, output: &OutputMode) -> AiResult {
        match output {
            OutputMode::Text => AiResult::Text(TextOutput {
                text: self.text,
                usage: self.usage,
                tool_calls: self.tool_calls,
            }),
            OutputMode::Object { .. } => AiResult::Object(ObjectOutput {
                object: serde_json::from_str(self.text.trim()).ok(),
                text: self.text,
                usage: self.usage,
                tool_calls: self.tool_calls,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::provider::mock::{MockAiProvider, MockAiProviderFactory};
    use crate::domain::llm::{AiStreamEvent, ProviderCallError, StreamType};
    use crate::domain::provider::Providers;
    use crate::domain::run_error::RunErrorCode;
    use futures::StreamExt;
    use serde_json::json;

    fn provider() -> ProviderApiKey {
        ProviderApiKey::new(1, 1, Providers::OpenAi, "openai", "sk-test")
    }

    fn invoker(mock: MockAiProvider) -> (AiInvoker, Arc<MockAiProvider>) {
        let mock = Arc::new(mock);
        let factory = Arc::new(MockAiProviderFactory::new(mock.clone()));
        (AiInvoker::new(factory), mock)
    }

    #[tokio::test]
    async fn test_invoke_returns_stream() {
        let (invoker, mock) = invoker(MockAiProvider::new().with_text("Hi", Usage::new(1, 1)));
        let config = PromptConfig::new().with_model("gpt-4o").with_temperature(0.5);

        let call = invoker
            .invoke(&provider(), &config, &[Message::user("Hello")])
            .await
            .unwrap();

        let events: Vec<_> = call.full_stream.collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(call.output, OutputMode::Text);

        let requests = mock.requests();
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn test_invoke_classifies_provider_errors() {
        let (invoker, _) = invoker(
            MockAiProvider::new().with_error(ProviderCallError::api_call(Some(401), "Bad key")),
        );
        let config = PromptConfig::new().with_model("gpt-4o");

        let error = invoker
            .invoke(&provider(), &config, &[Message::user("Hello")])
            .await
            .unwrap_err();

        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert_eq!(error.message(), "Bad key");
    }

    #[tokio::test]
    async fn test_invoke_rejects_unsupported_output() {
        let (invoker, mock) = invoker(MockAiProvider::new());
        let config = PromptConfig::new().with_model("gpt-4o").with_output("array");

        let error = invoker
            .invoke(&provider(), &config, &[Message::user("Hello")])
            .await
            .unwrap_err();

        assert!(error.is_fatal());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_accumulator_parses_object_output() {
        let accumulator = StreamAccumulator {
            text: "{\"result\": true, \"reason\": \"ok\"}".to_string(),
            ..Default::default()
        };

        let result = accumulator.into_result(&OutputMode::Object { schema: None });

        assert_eq!(result.stream_type(), StreamType::Object);
        match result {
            AiResult::Object(output) => {
                assert_eq!(output.object, Some(json!({"result": true, "reason": "ok"})))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_accumulator_invalid_json_yields_no_object() {
        let accumulator = StreamAccumulator {
            text: "not json".to_string(),
            ..Default::default()
        };

        match accumulator.into_result(&OutputMode::Object { schema: None }) {
            AiResult::Object(output) => assert!(output.object.is_none()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_stream_event_is_cloneable() {
        let event = AiStreamEvent::TextDelta("x".to_string());
        assert!(matches!(event.clone(), AiStreamEvent::TextDelta(_)));
    }
}
