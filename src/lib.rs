//! Prompt Chain Runner
//!
//! Runs compiled prompt chains against LLM providers:
//! - Per-step validation and a daily quota on the shared default provider
//! - Streamed partial output, independent of the final response
//! - One provider log per provider call, written inline or through a job queue
//! - Exactly one typed run error per failed run

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::{
    AiInvoker, AiProviderFactory, ChainRunner, ChainValidator, DocumentRunner, DomainError,
    EvaluationRunner, EventPublisher, FreeRunsManager, ProviderLogService, ProviderLogWriter,
    ProviderQuotaGuard,
};
use infrastructure::{
    cache::{CacheConfig, CacheFactory, CacheType},
    events::{ChannelEventPublisher, EventDispatcher},
    jobs::{JobWorker, TokioJobQueue},
    llm::HttpAiProviderFactory,
    observability::ObservabilitySubscriber,
    storage::{PostgresConfig, RunStores, StorageConfig, StorageFactory, StorageType},
};
use tracing::info;

/// Every service of the run pipeline, wired from configuration
#[derive(Debug)]
pub struct Pipeline {
    pub chain_runner: ChainRunner,
    pub document_runner: DocumentRunner,
    pub evaluation_runner: EvaluationRunner,
    pub stores: RunStores,
    publisher: Arc<ChannelEventPublisher>,
    dispatcher: EventDispatcher,
    worker: JobWorker,
}

impl Pipeline {
    /// Drains queued provider logs and pending events
    ///
    /// Runs still in flight keep their own handles alive; await their
    /// responses before shutting down.
    pub async fn shutdown(self) -> RunStores {
        let Pipeline {
            chain_runner,
            document_runner,
            evaluation_runner,
            stores,
            publisher,
            dispatcher,
            worker,
        } = self;

        drop(chain_runner);
        drop(document_runner);
        drop(evaluation_runner);
        worker.join().await;

        drop(publisher);
        dispatcher.join().await;

        info!("Pipeline drained");
        stores
    }
}

/// Builds the pipeline with the HTTP provider adapters
pub async fn build_pipeline(config: &AppConfig) -> Result<Pipeline, DomainError> {
    build_pipeline_with(config, Arc::new(HttpAiProviderFactory::default())).await
}

pub async fn build_pipeline_with(
    config: &AppConfig,
    provider_factory: Arc<dyn AiProviderFactory>,
) -> Result<Pipeline, DomainError> {
    let cache_config = cache_config(config)?;
    info!(cache_type = %cache_config.cache_type, "Creating counting cache");
    let cache = CacheFactory::create(&cache_config).await?;

    let storage_config = storage_config(config)?;
    info!(storage_type = ?storage_config.storage_type(), "Creating run stores");
    let stores = StorageFactory::create(&storage_config).await?;

    let (publisher, dispatcher) =
        ChannelEventPublisher::start(vec![Arc::new(ObservabilitySubscriber::new())]);
    let publisher = Arc::new(publisher);
    let events: Arc<dyn EventPublisher> = publisher.clone();

    let service = ProviderLogService::new(stores.provider_logs.clone(), events.clone());
    let (queue, worker) = TokioJobQueue::start(config.runner.job_queue_capacity, service.clone());
    let writer = ProviderLogWriter::new(service, Arc::new(queue), events.clone());

    let quota = ProviderQuotaGuard::new(FreeRunsManager::new(cache))
        .with_max_free_runs(config.quota.max_free_runs);
    let mut validator = ChainValidator::new(quota);
    if let Some(token) = &config.quota.default_provider_api_key {
        validator = validator.with_default_provider_api_key(token.clone());
    }

    let chain_runner = ChainRunner::new(
        validator,
        AiInvoker::new(provider_factory),
        writer,
        stores.run_errors.clone(),
    )
    .with_save_sync_provider_logs(config.runner.save_sync_provider_logs);

    let document_runner =
        DocumentRunner::new(chain_runner.clone(), stores.records.clone(), events.clone());
    let evaluation_runner = EvaluationRunner::new(
        chain_runner.clone(),
        stores.records.clone(),
        stores.provider_logs.clone(),
        events,
    );

    info!(
        save_sync_provider_logs = config.runner.save_sync_provider_logs,
        max_free_runs = config.quota.max_free_runs,
        "Run pipeline ready"
    );

    Ok(Pipeline {
        chain_runner,
        document_runner,
        evaluation_runner,
        stores,
        publisher,
        dispatcher,
        worker,
    })
}

fn cache_config(config: &AppConfig) -> Result<CacheConfig, DomainError> {
    let settings = &config.cache;
    let cache_config = match settings.cache_type.parse::<CacheType>()? {
        CacheType::InMemory => CacheConfig::in_memory(),
        CacheType::Redis => CacheConfig {
            cache_type: CacheType::Redis,
            redis_url: settings.redis_url.clone(),
            ..Default::default()
        },
    };

    Ok(match &settings.key_prefix {
        Some(prefix) => cache_config.with_key_prefix(prefix.clone()),
        None => cache_config,
    })
}

fn storage_config(config: &AppConfig) -> Result<StorageConfig, DomainError> {
    let settings = &config.storage;

    match settings.storage_type.parse::<StorageType>()? {
        StorageType::InMemory => Ok(StorageConfig::in_memory()),
        StorageType::Postgres => {
            let url = settings.postgres_url.clone().ok_or_else(|| {
                DomainError::configuration("storage.postgres_url is required for postgres storage")
            })?;
            Ok(StorageConfig::postgres(
                PostgresConfig::new(url).with_max_connections(settings.max_connections),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::{CompiledPrompt, CompiledStep, StaticChain};
    use crate::domain::llm::provider::mock::{MockAiProvider, MockAiProviderFactory};
    use crate::domain::{
        build_providers_map, ErrorableType, LogSources, Message, PromptConfig, ProviderApiKey,
        ProviderLogRepository, Providers, RunChain, Usage, Workspace,
    };

    fn run_chain() -> RunChain {
        let prompt = CompiledPrompt {
            raw_text: "Hi".to_string(),
            config: PromptConfig::new().with_provider("openai").with_model("gpt-4o"),
            steps: vec![CompiledStep {
                messages: vec![Message::user("Hi")],
                config: None,
            }],
        };

        RunChain::new(
            Box::new(StaticChain::new(prompt)),
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

    fn mock_factory() -> Arc<dyn AiProviderFactory> {
        let provider = MockAiProvider::new().with_text("Hello", Usage::new(2, 2));
        Arc::new(MockAiProviderFactory::new(Arc::new(provider)))
    }

    #[tokio::test]
    async fn test_async_logs_are_drained_on_shutdown() {
        let mut config = AppConfig::default();
        config.runner.save_sync_provider_logs = false;

        let pipeline = build_pipeline_with(&config, mock_factory()).await.unwrap();
        let output = pipeline
            .chain_runner
            .run(run_chain())
            .response
            .await
            .unwrap()
            .outcome
            .unwrap();
        assert!(output.provider_log.is_none());

        let stores = pipeline.shutdown().await;
        let log = stores
            .provider_logs
            .find_by_uuid(&output.provider_log_uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.tokens, 4);
    }

    #[tokio::test]
    async fn test_unknown_cache_type_is_rejected() {
        let mut config = AppConfig::default();
        config.cache.cache_type = "memcached".to_string();

        let error = build_pipeline_with(&config, mock_factory()).await.unwrap_err();
        assert!(matches!(error, DomainError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_postgres_without_url_is_rejected() {
        let mut config = AppConfig::default();
        config.storage.storage_type = "postgres".to_string();

        let error = build_pipeline_with(&config, mock_factory()).await.unwrap_err();
        assert!(matches!(error, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_cache_config_keeps_redis_settings() {
        let mut config = AppConfig::default();
        config.cache.cache_type = "redis".to_string();
        config.cache.redis_url = Some("redis://localhost:6379".to_string());
        config.cache.key_prefix = Some("runs:".to_string());

        let cache = cache_config(&config).unwrap();
        assert_eq!(cache.cache_type, CacheType::Redis);
        assert_eq!(cache.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(cache.key_prefix.as_deref(), Some("runs:"));
    }
}
