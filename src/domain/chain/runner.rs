use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{
    consume_stream, ChainEvent, ChainEventSink, ChainValidator, ProviderProcessor, StepSource,
    ValidateStep,
};
use crate::domain::llm::{AiInvoker, AiResult, PromptConfig};
use crate::domain::provider::ProvidersMap;
use crate::domain::provider_log::{ProviderLog, ProviderLogWriter};
use crate::domain::run_error::{
    ChainError, Errorable, ErrorableType, NewRunError, RunErrorCode, RunErrorRepository,
};
use crate::domain::workspace::{LogSources, Workspace};
use crate::domain::DomainError;

/// Input of [`ChainRunner::run`]
pub struct RunChain {
    pub chain: Box<dyn StepSource>,
    pub workspace: Workspace,
    pub providers_map: ProvidersMap,
    pub errorable_type: ErrorableType,
    pub source: LogSources,
    pub config_overrides: Option<PromptConfig>,
    pub api_key_id: Option<i64>,
}

impl RunChain {
    pub fn new(
        chain: Box<dyn StepSource>,
        workspace: Workspace,
        providers_map: ProvidersMap,
        errorable_type: ErrorableType,
        source: LogSources,
    ) -> Self {
        Self {
            chain,
            workspace,
            providers_map,
            errorable_type,
            source,
            config_overrides: None,
            api_key_id: None,
        }
    }

    pub fn with_config_overrides(mut self, overrides: PromptConfig) -> Self {
        self.config_overrides = Some(overrides);
        self
    }

    pub fn with_api_key_id(mut self, api_key_id: i64) -> Self {
        self.api_key_id = Some(api_key_id);
        self
    }
}

/// Response of the terminal step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainOutput {
    pub response: AiResult,
    pub provider_log_uuid: Uuid,
    /// Present when provider logs are written synchronously
    pub provider_log: Option<ProviderLog>,
    pub steps: usize,
}

/// Settled outcome of a run
#[derive(Debug, Clone)]
pub struct ChainResponse {
    pub errorable_uuid: Uuid,
    pub duration: Duration,
    /// Set when the run ends on a provider call, failed or not
    pub provider_log_uuid: Option<Uuid>,
    /// Present when provider logs are written synchronously
    pub provider_log: Option<ProviderLog>,
    pub outcome: Result<ChainOutput, ChainError>,
}

/// Final outcome of a spawned run task
///
/// Resolves to `Err` only for fatal failures: adapter contract violations
/// and unavailable infrastructure.
#[derive(Debug)]
pub struct RunResponse<T = ChainResponse> {
    handle: JoinHandle<Result<T, DomainError>>,
}

impl<T: Send + 'static> RunResponse<T> {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl<T> Future for RunResponse<T> {
    type Output = Result<T, DomainError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(DomainError::internal(format!("Chain run task failed: {}", e)))
            })
        })
    }
}

/// A started run
///
/// `stream` and `response` are independent: partial output can be read
/// before the final log is durable.
#[derive(Debug)]
pub struct ChainRun {
    pub errorable_uuid: Uuid,
    pub stream: UnboundedReceiverStream<ChainEvent>,
    pub response: RunResponse,
}

enum StepsOutcome {
    Completed(ChainOutput),
    /// Nothing persisted the error yet
    Failed(ChainError),
    /// The provider log transaction stored, or the queued job will store, the error
    FailedWithLog {
        error: ChainError,
        provider_log_uuid: Uuid,
        provider_log: Option<ProviderLog>,
    },
}

/// Drives a chain step by step until it completes or fails
#[derive(Clone)]
pub struct ChainRunner {
    validator: ChainValidator,
    invoker: AiInvoker,
    writer: ProviderLogWriter,
    run_errors: Arc<dyn RunErrorRepository>,
    save_sync_provider_logs: bool,
}

impl std::fmt::Debug for ChainRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRunner")
            .field("save_sync_provider_logs", &self.save_sync_provider_logs)
            .finish_non_exhaustive()
    }
}

impl ChainRunner {
    pub fn new(
        validator: ChainValidator,
        invoker: AiInvoker,
        writer: ProviderLogWriter,
        run_errors: Arc<dyn RunErrorRepository>,
    ) -> Self {
        Self {
            validator,
            invoker,
            writer,
            run_errors,
            save_sync_provider_logs: true,
        }
    }

    pub fn with_save_sync_provider_logs(mut self, save_sync: bool) -> Self {
        self.save_sync_provider_logs = save_sync;
        self
    }

    /// Starts a run on the tokio runtime and returns immediately
    pub fn run(&self, input: RunChain) -> ChainRun {
        let errorable_uuid = Uuid::new_v4();
        let (sink, receiver) = ChainEventSink::channel();

        let span = info_span!(
            "chain_run",
            %errorable_uuid,
            workspace_id = input.workspace.id,
            errorable_type = %input.errorable_type,
        );
        let runner = self.clone();
        let response = RunResponse::spawn(
            async move { runner.drive(input, errorable_uuid, sink).await }.instrument(span),
        );

        ChainRun {
            errorable_uuid,
            stream: UnboundedReceiverStream::new(receiver),
            response,
        }
    }

    async fn drive(
        self,
        mut input: RunChain,
        errorable_uuid: Uuid,
        sink: ChainEventSink,
    ) -> Result<ChainResponse, DomainError> {
        let started = Instant::now();
        let errorable = Errorable::new(input.errorable_type, errorable_uuid);

        let (outcome, provider_log_uuid, provider_log) = match self
            .run_steps(&mut input, errorable, &sink)
            .await
        {
            Ok(StepsOutcome::Completed(output)) => {
                info!(steps = output.steps, "Chain run completed");
                let provider_log_uuid = Some(output.provider_log_uuid);
                let provider_log = output.provider_log.clone();
                (Ok(output), provider_log_uuid, provider_log)
            }
            Ok(StepsOutcome::FailedWithLog {
                error,
                provider_log_uuid,
                provider_log,
            }) => (Err(error), Some(provider_log_uuid), provider_log),
            Ok(StepsOutcome::Failed(error)) => {
                (Err(self.persist_error(errorable, error).await?), None, None)
            }
            Err(e) => {
                error!(error = %e, "Chain run failed");
                let code = match &e {
                    DomainError::Chain(inner) => inner.code(),
                    _ => RunErrorCode::Unknown,
                };
                sink.send(ChainEvent::Error {
                    code,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if let Err(ref chain_error) = outcome {
            warn!(code = %chain_error.code(), message = chain_error.message(), "Chain run failed");
            sink.send(ChainEvent::Error {
                code: chain_error.code(),
                message: chain_error.message().to_string(),
            });
        }
        sink.send(ChainEvent::Completed { errorable_uuid });

        Ok(ChainResponse {
            errorable_uuid,
            duration: started.elapsed(),
            provider_log_uuid,
            provider_log,
            outcome,
        })
    }

    async fn run_steps(
        &self,
        input: &mut RunChain,
        errorable: Errorable,
        sink: &ChainEventSink,
    ) -> Result<StepsOutcome, DomainError> {
        let mut last_response: Option<String> = None;
        let mut step = 0;

        loop {
            let validated = match self
                .validator
                .call(ValidateStep {
                    chain: input.chain.as_mut(),
                    last_response: last_response.as_deref(),
                    workspace: &input.workspace,
                    providers_map: &input.providers_map,
                    config_overrides: input.config_overrides.as_ref(),
                })
                .await?
            {
                Ok(validated) => validated,
                Err(e) => return Ok(StepsOutcome::Failed(e)),
            };

            let conversation = &validated.conversation;
            sink.send(ChainEvent::StepStarted {
                step,
                messages: conversation.messages.clone(),
                config: conversation.config.clone(),
            });

            let start = Instant::now();
            let call = match self
                .invoker
                .invoke(&validated.provider, &conversation.config, &conversation.messages)
                .await
            {
                Ok(call) => call,
                Err(e) if e.is_fatal() => return Err(DomainError::Chain(e)),
                Err(e) => return Ok(StepsOutcome::Failed(e)),
            };

            let (consumed, accumulator) = consume_stream(call.full_stream, sink, step).await;
            let ai_result = accumulator.into_result(&call.output);

            let processor = ProviderProcessor {
                writer: &self.writer,
                provider: &validated.provider,
                source: input.source,
                config: &conversation.config,
                messages: &conversation.messages,
                save_sync: self.save_sync_provider_logs,
                errorable,
                api_key_id: input.api_key_id,
            };
            let processed = processor.call(ai_result, start, &consumed).await?;

            sink.send(ChainEvent::StepCompleted {
                step,
                finish_reason: consumed.finish_reason,
                provider_log_uuid: processed.provider_log_uuid,
            });

            if let Some(mut chain_error) = consumed.error {
                let provider_log = processed.provider_log.map(|created| {
                    if let Some(run_error) = created.run_error {
                        chain_error.attach_db_error(run_error);
                    }
                    created.provider_log
                });
                return Ok(StepsOutcome::FailedWithLog {
                    error: chain_error,
                    provider_log_uuid: processed.provider_log_uuid,
                    provider_log,
                });
            }

            if validated.completed {
                return Ok(StepsOutcome::Completed(ChainOutput {
                    provider_log_uuid: processed.provider_log_uuid,
                    provider_log: processed.provider_log.map(|created| created.provider_log),
                    response: processed.response,
                    steps: step + 1,
                }));
            }

            last_response = Some(processed.response.text().to_string());
            step += 1;
        }
    }

    async fn persist_error(
        &self,
        errorable: Errorable,
        mut error: ChainError,
    ) -> Result<ChainError, DomainError> {
        let run_error = self
            .run_errors
            .create(NewRunError::from_chain_error(errorable, &error))
            .await?;
        error.attach_db_error(run_error);
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CountingCache, MockCountingCache};
    use crate::domain::chain::step::mock::FailingChain;
    use crate::domain::chain::{CompiledPrompt, CompiledStep, StaticChain};
    use crate::domain::events::RecordingPublisher;
    use crate::domain::jobs::Job;
    use crate::domain::llm::provider::mock::{MockAiProvider, MockAiProviderFactory};
    use crate::domain::llm::{AiStreamEvent, FinishReason, Message, ProviderCallError, Usage};
    use crate::domain::provider::{build_providers_map, ProviderApiKey, Providers};
    use crate::domain::provider_log::{
        MockProviderLogRepository, ProviderErrorLink, ProviderLogRepository, ProviderLogService,
    };
    use crate::domain::run_error::RunErrorDetails;
    use crate::domain::quota::{FreeRunsManager, ProviderQuotaGuard};
    use crate::infrastructure::cache::InMemoryCountingCache;
    use crate::infrastructure::jobs::TokioJobQueue;
    use crate::infrastructure::storage::InMemoryRunStore;
    use futures::StreamExt;
    use tokio::sync::mpsc;

    struct Harness {
        runner: ChainRunner,
        store: Arc<InMemoryRunStore>,
        provider: Arc<MockAiProvider>,
        publisher: Arc<RecordingPublisher>,
        jobs: mpsc::Receiver<Job>,
    }

    fn harness(mock: MockAiProvider) -> Harness {
        let store = Arc::new(InMemoryRunStore::new());
        harness_with_logs(mock, store.clone(), store)
    }

    fn harness_with_logs(
        mock: MockAiProvider,
        store: Arc<InMemoryRunStore>,
        provider_logs: Arc<dyn ProviderLogRepository>,
    ) -> Harness {
        let publisher = Arc::new(RecordingPublisher::new());
        let provider = Arc::new(mock);
        let (queue, jobs) = TokioJobQueue::new(8);

        let service = ProviderLogService::new(provider_logs, publisher.clone());
        let writer = ProviderLogWriter::new(service, Arc::new(queue), publisher.clone());
        let cache: Arc<dyn CountingCache> = Arc::new(InMemoryCountingCache::new());
        let validator = ChainValidator::new(ProviderQuotaGuard::new(FreeRunsManager::new(cache)));
        let invoker = AiInvoker::new(Arc::new(MockAiProviderFactory::new(provider.clone())));

        Harness {
            runner: ChainRunner::new(validator, invoker, writer, store.clone()),
            store,
            provider,
            publisher,
            jobs,
        }
    }

    fn prompt(steps: usize) -> CompiledPrompt {
        CompiledPrompt {
            raw_text: "Say hi".to_string(),
            config: PromptConfig::new().with_provider("openai").with_model("gpt-4o"),
            steps: (0..steps)
                .map(|i| CompiledStep {
                    messages: vec![Message::user(format!("Step {i}"))],
                    config: None,
                })
                .collect(),
        }
    }

    fn run_chain(chain: Box<dyn StepSource>) -> RunChain {
        RunChain::new(
            chain,
            Workspace::new(1, "acme"),
            build_providers_map(vec![ProviderApiKey::new(
                10,
                1,
                Providers::OpenAi,
                "openai",
                "sk-test",
            )]),
            ErrorableType::DocumentLog,
            LogSources::Api,
        )
    }

    #[tokio::test]
    async fn test_single_step_run_completes_with_provider_log() {
        let h = harness(MockAiProvider::new().with_text("Hi there", Usage::new(3, 7)));

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let events: Vec<ChainEvent> = run.stream.collect().await;
        let response = run.response.await.unwrap();

        assert_eq!(response.errorable_uuid, run.errorable_uuid);
        let output = response.outcome.unwrap();
        assert_eq!(output.steps, 1);
        assert_eq!(output.response.text(), "Hi there");

        let log = output.provider_log.unwrap();
        assert_eq!(log.uuid, output.provider_log_uuid);
        assert_eq!(log.tokens, 10);
        assert_eq!(log.finish_reason, FinishReason::Stop);
        assert_eq!(log.response_text.as_deref(), Some("Hi there"));
        assert_eq!(log.document_log_uuid, Some(run.errorable_uuid));
        assert!(log.error_id.is_none());

        assert!(matches!(events.first(), Some(ChainEvent::StepStarted { step: 0, .. })));
        assert!(events.contains(&ChainEvent::TextDelta {
            step: 0,
            delta: "Hi there".to_string()
        }));
        assert_eq!(
            events.last(),
            Some(&ChainEvent::Completed {
                errorable_uuid: run.errorable_uuid
            })
        );

        assert_eq!(h.store.provider_logs().unwrap().len(), 1);
        assert!(h.store.run_errors().unwrap().is_empty());
        assert!(h.store.provider_key_last_used(10).unwrap().is_some());
        let names = h.publisher.names();
        assert!(names.contains(&"aiProviderCallCompleted"));
        assert!(names.contains(&"providerLogCreated"));
    }

    #[tokio::test]
    async fn test_validation_failure_persists_error_without_calling_provider() {
        let h = harness(MockAiProvider::new().with_text("unused", Usage::default()));
        let mut compiled = prompt(1);
        compiled.config = compiled.config.with_provider("anthropic");

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(compiled))));
        let events: Vec<ChainEvent> = run.stream.collect().await;
        let response = run.response.await.unwrap();

        let error = response.outcome.unwrap_err();
        assert_eq!(error.code(), RunErrorCode::MissingProvider);
        let db_error = error.db_error().unwrap();
        assert_eq!(db_error.errorable_uuid, run.errorable_uuid);
        assert_eq!(db_error.errorable_type, ErrorableType::DocumentLog);

        assert_eq!(h.store.run_errors().unwrap().len(), 1);
        assert!(h.store.provider_logs().unwrap().is_empty());
        assert!(h.provider.requests().is_empty());

        assert!(matches!(
            &events[..],
            [
                ChainEvent::Error {
                    code: RunErrorCode::MissingProvider,
                    ..
                },
                ChainEvent::Completed { .. }
            ]
        ));
    }

    #[tokio::test]
    async fn test_compile_error_is_reported() {
        let h = harness(MockAiProvider::new());

        let run = h
            .runner
            .run(run_chain(Box::new(FailingChain::new("unknown-tag", "Unknown tag"))));
        let response = run.response.await.unwrap();

        let error = response.outcome.unwrap_err();
        assert_eq!(error.code(), RunErrorCode::ChainCompileError);
        assert_eq!(error.message(), "Error validating chain");
        assert_eq!(
            error.details(),
            Some(&RunErrorDetails::ChainCompile {
                compile_code: "unknown-tag".to_string(),
                message: "Unknown tag".to_string(),
            })
        );
        assert!(response.provider_log_uuid.is_none());
        assert_eq!(h.store.run_errors().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_step_run_feeds_previous_response() {
        let h = harness(
            MockAiProvider::new()
                .with_text("First", Usage::new(1, 1))
                .with_text("Second", Usage::new(2, 2)),
        );

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(prompt(2)))));
        let events: Vec<ChainEvent> = run.stream.collect().await;
        let output = run.response.await.unwrap().outcome.unwrap();

        assert_eq!(output.steps, 2);
        assert_eq!(output.response.text(), "Second");

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].messages,
            vec![
                Message::user("Step 0"),
                Message::assistant("First"),
                Message::user("Step 1"),
            ]
        );

        let logs = h.store.provider_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs
            .iter()
            .all(|log| log.document_log_uuid == Some(run.errorable_uuid)));

        let completed_steps = events
            .iter()
            .filter(|e| matches!(e, ChainEvent::StepCompleted { .. }))
            .count();
        assert_eq!(completed_steps, 2);
    }

    #[tokio::test]
    async fn test_stream_error_yields_one_log_and_one_run_error() {
        let h = harness(MockAiProvider::new().with_raw(vec![
            Ok(AiStreamEvent::TextDelta("Par".to_string())),
            Err(ProviderCallError::api_call(Some(500), "Overloaded")),
        ]));

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let events: Vec<ChainEvent> = run.stream.collect().await;
        let response = run.response.await.unwrap();

        let error = response.outcome.unwrap_err();
        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert_eq!(error.message(), "Overloaded");

        let run_errors = h.store.run_errors().unwrap();
        assert_eq!(run_errors.len(), 1);
        assert_eq!(run_errors[0].errorable_uuid, run.errorable_uuid);
        assert_eq!(error.db_error(), Some(&run_errors[0]));

        let logs = h.store.provider_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].finish_reason, FinishReason::Error);
        assert_eq!(logs[0].error_id, Some(run_errors[0].id));
        assert_eq!(logs[0].response_text.as_deref(), Some("Par"));
        assert_eq!(response.provider_log_uuid, Some(logs[0].uuid));
        assert_eq!(response.provider_log.as_ref(), Some(&logs[0]));

        assert!(events.contains(&ChainEvent::StepCompleted {
            step: 0,
            finish_reason: FinishReason::Error,
            provider_log_uuid: logs[0].uuid,
        }));
    }

    #[tokio::test]
    async fn test_provider_rejection_is_run_error() {
        let h = harness(
            MockAiProvider::new().with_error(ProviderCallError::api_call(Some(401), "Bad key")),
        );

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let error = run.response.await.unwrap().outcome.unwrap_err();

        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert_eq!(h.store.run_errors().unwrap().len(), 1);
        assert!(h.store.provider_logs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_output_is_fatal() {
        let h = harness(MockAiProvider::new());
        let mut compiled = prompt(1);
        compiled.config = compiled.config.with_output("array");

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(compiled))));
        let events: Vec<ChainEvent> = run.stream.collect().await;
        let result = run.response.await;

        match result {
            Err(DomainError::Chain(error)) => assert_eq!(
                error.code(),
                RunErrorCode::UnsupportedProviderResponseTypeError
            ),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(h.store.run_errors().unwrap().is_empty());
        assert!(matches!(
            events.last(),
            Some(ChainEvent::Error {
                code: RunErrorCode::UnsupportedProviderResponseTypeError,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_async_path_queues_provider_log() {
        let mut h = harness(MockAiProvider::new().with_text("Queued", Usage::new(1, 2)));
        let runner = h.runner.clone().with_save_sync_provider_logs(false);

        let run = runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let output = run.response.await.unwrap().outcome.unwrap();

        assert!(output.provider_log.is_none());
        assert!(h.store.provider_logs().unwrap().is_empty());

        match h.jobs.try_recv().unwrap() {
            Job::CreateProviderLog(log) => {
                assert_eq!(log.data.uuid, output.provider_log_uuid);
                assert_eq!(log.data.usage.total_tokens, 3);
                assert_eq!(log.finish_reason, FinishReason::Stop);
            }
        }
    }

    #[tokio::test]
    async fn test_async_stream_error_leaves_run_error_to_queued_log() {
        let mut h = harness(MockAiProvider::new().with_raw(vec![
            Ok(AiStreamEvent::TextDelta("Par".to_string())),
            Err(ProviderCallError::api_call(Some(500), "Overloaded")),
        ]));
        let runner = h.runner.clone().with_save_sync_provider_logs(false);

        let run = runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let response = run.response.await.unwrap();

        let error = response.outcome.unwrap_err();
        assert_eq!(error.code(), RunErrorCode::AiRunError);
        assert!(error.db_error().is_none());
        assert!(response.provider_log.is_none());
        assert!(h.store.run_errors().unwrap().is_empty());
        assert!(h.store.provider_logs().unwrap().is_empty());

        match h.jobs.try_recv().unwrap() {
            Job::CreateProviderLog(log) => {
                assert_eq!(response.provider_log_uuid, Some(log.data.uuid));
                assert_eq!(log.finish_reason, FinishReason::Error);
                assert_eq!(
                    log.provider_error,
                    Some(ProviderErrorLink {
                        errorable_type: ErrorableType::DocumentLog,
                        errorable_uuid: run.errorable_uuid,
                        error_code: RunErrorCode::AiRunError,
                        message: "Overloaded".to_string(),
                    })
                );
            }
        }
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_quota_cache_is_fatal() {
        let store = Arc::new(InMemoryRunStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let provider = Arc::new(MockAiProvider::new().with_text("unused", Usage::default()));
        let (queue, _jobs) = TokioJobQueue::new(8);

        let service = ProviderLogService::new(store.clone(), publisher.clone());
        let writer = ProviderLogWriter::new(service, Arc::new(queue), publisher);
        let cache: Arc<dyn CountingCache> =
            Arc::new(MockCountingCache::new().with_error("connection refused"));
        let validator = ChainValidator::new(ProviderQuotaGuard::new(FreeRunsManager::new(cache)))
            .with_default_provider_api_key("sk-test");
        let invoker = AiInvoker::new(Arc::new(MockAiProviderFactory::new(provider.clone())));
        let runner = ChainRunner::new(validator, invoker, writer, store.clone());

        let run = runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let result = run.response.await;

        assert!(matches!(result, Err(DomainError::Cache { .. })));
        assert!(store.run_errors().unwrap().is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let mut provider_logs = MockProviderLogRepository::new();
        provider_logs
            .expect_create()
            .times(1)
            .returning(|_, _| Err(DomainError::storage("Failed to insert provider log")));
        let h = harness_with_logs(
            MockAiProvider::new().with_text("Hi", Usage::new(1, 1)),
            Arc::new(InMemoryRunStore::new()),
            Arc::new(provider_logs),
        );

        let run = h.runner.run(run_chain(Box::new(StaticChain::new(prompt(1)))));
        let result = run.response.await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert!(h.store.run_errors().unwrap().is_empty());
    }
}
