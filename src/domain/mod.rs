//! Domain layer - Core business logic and entities

pub mod cache;
pub mod chain;
pub mod error;
pub mod events;
pub mod jobs;
pub mod llm;
pub mod provider;
pub mod provider_log;
pub mod quota;
pub mod run_error;
pub mod runs;
pub mod usage;
pub mod workspace;

pub use cache::CountingCache;
pub use chain::{
    ChainEvent, ChainOutput, ChainResponse, ChainRun, ChainRunner, ChainValidator, CompiledPrompt,
    RunChain, StaticChain, StepSource,
};
pub use error::DomainError;
pub use events::{Event, EventPublisher, EventSubscriber};
pub use jobs::{Job, JobQueue};
pub use llm::{
    AiInvoker, AiProvider, AiProviderFactory, AiResult, FinishReason, Message, MessageRole,
    PromptConfig, Usage,
};
pub use provider::{build_providers_map, ProviderApiKey, Providers, ProvidersMap};
pub use provider_log::{ProviderLog, ProviderLogRepository, ProviderLogService, ProviderLogWriter};
pub use quota::{FreeRunsManager, ProviderQuotaGuard, DEFAULT_PROVIDER_MAX_FREE_RUNS};
pub use run_error::{ChainError, ErrorableType, RunError, RunErrorCode, RunErrorRepository};
pub use runs::{DocumentRunner, EvaluationRunner, RunRecordRepository};
pub use workspace::{LogSources, Workspace};
