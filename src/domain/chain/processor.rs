use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::StreamConsumedResult;
use crate::domain::llm::{AiResult, Message, PromptConfig};
use crate::domain::provider::ProviderApiKey;
use crate::domain::provider_log::{
    CreatedProviderLog, ProviderLogData, ProviderLogWriter, SaveProviderLog,
};
use crate::domain::run_error::Errorable;
use crate::domain::workspace::LogSources;
use crate::domain::DomainError;

/// Normalized response of one step, with its provider log
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub response: AiResult,
    pub provider_log_uuid: Uuid,
    /// `None` when the log was handed to the job queue
    pub provider_log: Option<CreatedProviderLog>,
}

/// Turns a consumed provider call into log data and persists it
#[derive(Debug)]
pub struct ProviderProcessor<'a> {
    pub writer: &'a ProviderLogWriter,
    pub provider: &'a ProviderApiKey,
    pub source: LogSources,
    pub config: &'a PromptConfig,
    pub messages: &'a [Message],
    pub save_sync: bool,
    pub errorable: Errorable,
    pub api_key_id: Option<i64>,
}

impl ProviderProcessor<'_> {
    pub async fn call(
        &self,
        ai_result: AiResult,
        start: Instant,
        consumed: &StreamConsumedResult,
    ) -> Result<ProcessedResponse, DomainError> {
        let data = self.build_log_data(&ai_result, start);
        let provider_log_uuid = data.uuid;

        let provider_log = self
            .writer
            .save(SaveProviderLog {
                data,
                stream_type: ai_result.stream_type(),
                save_sync: self.save_sync,
                consumed,
                errorable: self.errorable,
            })
            .await?;

        Ok(ProcessedResponse {
            response: ai_result,
            provider_log_uuid,
            provider_log,
        })
    }

    fn build_log_data(&self, ai_result: &AiResult, start: Instant) -> ProviderLogData {
        let (response_text, response_object) = match ai_result {
            AiResult::Text(output) => (Some(output.text.clone()), None),
            AiResult::Object(output) => (Some(output.text.clone()), output.object.clone()),
        };

        ProviderLogData {
            uuid: Uuid::new_v4(),
            generated_at: Utc::now(),
            workspace_id: self.provider.workspace_id,
            provider_id: self.provider.id,
            provider_type: self.provider.provider,
            model: self.config.model.clone().unwrap_or_default(),
            config: self.config.clone(),
            messages: self.messages.to_vec(),
            response_text,
            response_object,
            tool_calls: ai_result.tool_calls().to_vec(),
            usage: ai_result.usage(),
            duration_ms: start.elapsed().as_millis() as u64,
            source: self.source,
            api_key_id: self.api_key_id,
            document_log_uuid: Some(self.errorable.errorable_uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::RecordingPublisher;
    use crate::domain::jobs::MockJobQueue;
    use crate::domain::llm::{FinishReason, ObjectOutput, TextOutput, Usage};
    use crate::domain::provider::Providers;
    use crate::domain::provider_log::{
        MockProviderLogRepository, ProviderLog, ProviderLogService,
    };
    use crate::domain::run_error::ErrorableType;
    use serde_json::json;
    use std::sync::Arc;

    fn writer() -> ProviderLogWriter {
        let mut repository = MockProviderLogRepository::new();
        repository.expect_create().returning(|log, cost| {
            Ok(CreatedProviderLog {
                provider_log: ProviderLog::from_new(1, &log, cost, None),
                run_error: None,
            })
        });
        let publisher = Arc::new(RecordingPublisher::new());
        let service = ProviderLogService::new(Arc::new(repository), publisher.clone());
        ProviderLogWriter::new(service, Arc::new(MockJobQueue::new()), publisher)
    }

    #[tokio::test]
    async fn test_text_response_is_logged() {
        let writer = writer();
        let provider = ProviderApiKey::new(10, 4, Providers::OpenAi, "openai", "sk");
        let config = PromptConfig::new().with_provider("openai").with_model("gpt-4o");
        let messages = vec![Message::user("Hello")];
        let errorable = Errorable::new(ErrorableType::DocumentLog, Uuid::new_v4());

        let processor = ProviderProcessor {
            writer: &writer,
            provider: &provider,
            source: LogSources::Playground,
            config: &config,
            messages: &messages,
            save_sync: true,
            errorable,
            api_key_id: Some(5),
        };

        let ai_result = AiResult::Text(TextOutput {
            text: "Hi there".to_string(),
            usage: Usage::new(3, 7),
            tool_calls: vec![],
        });

        let processed = processor
            .call(
                ai_result,
                Instant::now(),
                &StreamConsumedResult::finished(FinishReason::Stop),
            )
            .await
            .unwrap();

        let log = processed.provider_log.unwrap().provider_log;
        assert_eq!(log.uuid, processed.provider_log_uuid);
        assert_eq!(log.tokens, 10);
        assert_eq!(log.cost_in_millicents, 12);
        assert_eq!(log.response_text.as_deref(), Some("Hi there"));
        assert_eq!(log.document_log_uuid, Some(errorable.errorable_uuid));
        assert_eq!(log.provider_id, 10);
        assert_eq!(log.api_key_id, Some(5));
        assert_eq!(log.source, LogSources::Playground);
    }

    #[tokio::test]
    async fn test_object_response_is_logged() {
        let writer = writer();
        let provider = ProviderApiKey::new(10, 4, Providers::OpenAi, "openai", "sk");
        let config = PromptConfig::new().with_model("gpt-4o").with_output("object");
        let errorable = Errorable::new(ErrorableType::EvaluationResult, Uuid::new_v4());

        let processor = ProviderProcessor {
            writer: &writer,
            provider: &provider,
            source: LogSources::Evaluation,
            config: &config,
            messages: &[],
            save_sync: true,
            errorable,
            api_key_id: None,
        };

        let ai_result = AiResult::Object(ObjectOutput {
            object: Some(json!({"result": true, "reason": "ok"})),
            text: "{\"result\":true,\"reason\":\"ok\"}".to_string(),
            usage: Usage::new(1, 1),
            tool_calls: vec![],
        });

        let processed = processor
            .call(
                ai_result,
                Instant::now(),
                &StreamConsumedResult::finished(FinishReason::Stop),
            )
            .await
            .unwrap();

        let log = processed.provider_log.unwrap().provider_log;
        assert_eq!(log.response_object, Some(json!({"result": true, "reason": "ok"})));
    }
}
