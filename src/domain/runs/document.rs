use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use uuid::Uuid;

use super::{DocumentLog, NewDocumentLog, RunRecordRepository};
use crate::domain::chain::{
    ChainEvent, ChainResponse, ChainRunner, CompiledPrompt, RunChain, RunResponse, StaticChain,
};
use crate::domain::events::{DocumentRunData, Event, EventPublisher};
use crate::domain::provider::{build_providers_map, ProviderApiKey};
use crate::domain::run_error::ErrorableType;
use crate::domain::workspace::{LogSources, Workspace};

/// Input of [`DocumentRunner::run_document`]
#[derive(Debug, Clone)]
pub struct RunDocument {
    pub workspace: Workspace,
    pub document_uuid: Uuid,
    pub commit_uuid: Uuid,
    pub prompt: CompiledPrompt,
    pub parameters: Map<String, Value>,
    pub source: LogSources,
    pub providers: Vec<ProviderApiKey>,
}

#[derive(Debug, Clone)]
pub struct DocumentRunResponse {
    pub chain: ChainResponse,
    pub document_log: DocumentLog,
}

/// A started document run
#[derive(Debug)]
pub struct DocumentRun {
    pub document_log_uuid: Uuid,
    pub resolved_content: String,
    pub stream: UnboundedReceiverStream<ChainEvent>,
    pub response: RunResponse<DocumentRunResponse>,
}

/// Runs a document prompt and records its document log
#[derive(Clone)]
pub struct DocumentRunner {
    runner: ChainRunner,
    records: Arc<dyn RunRecordRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for DocumentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRunner").finish_non_exhaustive()
    }
}

impl DocumentRunner {
    pub fn new(
        runner: ChainRunner,
        records: Arc<dyn RunRecordRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            runner,
            records,
            publisher,
        }
    }

    /// Starts the run; the document log is created once the chain settles,
    /// whatever its outcome
    pub fn run_document(&self, input: RunDocument) -> DocumentRun {
        let RunDocument {
            workspace,
            document_uuid,
            commit_uuid,
            prompt,
            parameters,
            source,
            providers,
        } = input;

        let resolved_content = prompt.raw_text.clone();
        let run = self.runner.run(RunChain::new(
            Box::new(StaticChain::new(prompt)),
            workspace.clone(),
            build_providers_map(providers),
            ErrorableType::DocumentLog,
            source,
        ));
        let document_log_uuid = run.errorable_uuid;

        let records = self.records.clone();
        let publisher = self.publisher.clone();
        let content = resolved_content.clone();
        let chain_response = run.response;

        let response = RunResponse::spawn(async move {
            let chain = chain_response.await?;
            let duration_ms = chain.duration.as_millis() as u64;

            publisher.publish_later(Event::DocumentRun(DocumentRunData {
                workspace_id: workspace.id,
                document_uuid,
                commit_uuid,
                document_log_uuid,
                parameters: parameters.clone(),
                resolved_content: content.clone(),
                duration_ms,
                source,
                error_code: chain.outcome.as_ref().err().map(|e| e.code()),
            }));

            let document_log = records
                .create_document_log(NewDocumentLog {
                    uuid: document_log_uuid,
                    document_uuid,
                    commit_uuid,
                    parameters,
                    resolved_content: content,
                    duration_ms,
                    source,
                })
                .await?;
            info!(%document_log_uuid, "Document log created");

            Ok(DocumentRunResponse {
                chain,
                document_log,
            })
        });

        DocumentRun {
            document_log_uuid,
            resolved_content,
            stream: run.stream,
            response,
        }
    }
}
