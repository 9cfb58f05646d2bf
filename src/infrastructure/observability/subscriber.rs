//! Logging and metrics subscriber of the event bus

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::metrics::{record_chain_run, record_llm_request, LlmRequestMetricParams};
use crate::domain::events::{Event, EventSubscriber};
use crate::domain::llm::FinishReason;

#[derive(Debug, Default)]
pub struct ObservabilitySubscriber;

impl ObservabilitySubscriber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSubscriber for ObservabilitySubscriber {
    fn name(&self) -> &'static str {
        "observability"
    }

    async fn handle(&self, event: &Event) {
        match event {
            Event::AiProviderCallCompleted {
                log,
                stream_type,
                finish_reason,
            } => {
                info!(
                    provider = log.provider_type.as_str(),
                    model = %log.model,
                    workspace_id = log.workspace_id,
                    provider_log_uuid = %log.uuid,
                    ?stream_type,
                    finish_reason = finish_reason.as_str(),
                    tokens = log.usage.total_tokens,
                    duration_ms = log.duration_ms,
                    "AI provider call completed"
                );

                record_llm_request(LlmRequestMetricParams {
                    provider: log.provider_type.as_str(),
                    model: &log.model,
                    duration: Duration::from_millis(log.duration_ms),
                    success: *finish_reason != FinishReason::Error,
                    input_tokens: Some(u64::from(log.usage.prompt_tokens)),
                    output_tokens: Some(u64::from(log.usage.completion_tokens)),
                });
            }
            Event::ProviderLogCreated(log) => {
                info!(
                    provider_log_uuid = %log.uuid,
                    model = %log.model,
                    cost_in_millicents = log.cost_in_millicents,
                    error_id = ?log.error_id,
                    "Provider log created"
                );
            }
            Event::DocumentRun(data) => {
                let status = data.error_code.map_or("success", |code| code.as_str());
                record_chain_run("document", status);
            }
            Event::EvaluationRun(_) => record_chain_run("evaluation", "success"),
            Event::EvaluationResultCreated(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::StreamType;
    use crate::domain::provider_log::fixtures::provider_log_data;

    #[tokio::test]
    async fn test_handles_every_event_kind() {
        let subscriber = ObservabilitySubscriber::new();

        subscriber
            .handle(&Event::AiProviderCallCompleted {
                log: provider_log_data(),
                stream_type: StreamType::Text,
                finish_reason: FinishReason::Error,
            })
            .await;

        assert_eq!(subscriber.name(), "observability");
    }
}
