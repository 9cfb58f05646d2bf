use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{DocumentLog, Evaluation, EvaluationResult, NewEvaluationResult, RunRecordRepository};
use crate::domain::chain::{ChainResponse, ChainRunner, RunChain, StaticChain};
use crate::domain::events::{EvaluationResultCreatedData, EvaluationRunData, Event, EventPublisher};
use crate::domain::llm::{AiResult, PromptConfig};
use crate::domain::provider::{build_providers_map, ProviderApiKey};
use crate::domain::provider_log::ProviderLogRepository;
use crate::domain::run_error::ErrorableType;
use crate::domain::workspace::{LogSources, Workspace};
use crate::domain::DomainError;

const INVALID_JSON_MESSAGE: &str = "Provider did not return a valid JSON-formatted response";

/// Input of [`EvaluationRunner::run_evaluation`]
#[derive(Debug, Clone)]
pub struct RunEvaluation {
    pub workspace: Workspace,
    pub evaluation: Evaluation,
    pub document_log: DocumentLog,
    pub providers: Vec<ProviderApiKey>,
}

#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub errorable_uuid: Uuid,
    pub chain: ChainResponse,
    pub evaluation_result: EvaluationResult,
}

/// Judges a document log with an evaluation prompt
#[derive(Clone)]
pub struct EvaluationRunner {
    runner: ChainRunner,
    records: Arc<dyn RunRecordRepository>,
    provider_logs: Arc<dyn ProviderLogRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for EvaluationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationRunner").finish_non_exhaustive()
    }
}

impl EvaluationRunner {
    pub fn new(
        runner: ChainRunner,
        records: Arc<dyn RunRecordRepository>,
        provider_logs: Arc<dyn ProviderLogRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            runner,
            records,
            provider_logs,
            publisher,
        }
    }

    /// Runs the evaluation to completion and stores its result
    ///
    /// The provider is forced to answer with an object matching the
    /// evaluation's result schema. A failed chain still yields an
    /// evaluation result, without a value.
    pub async fn run_evaluation(
        &self,
        input: RunEvaluation,
    ) -> Result<EvaluationRun, DomainError> {
        let RunEvaluation {
            workspace,
            evaluation,
            document_log,
            providers,
        } = input;

        let logs = self
            .provider_logs
            .list_by_document_log(&document_log.uuid)
            .await?;
        if logs.is_empty() {
            return Err(DomainError::not_found(format!(
                "ProviderLog not found with documentLogUuid {}",
                document_log.uuid
            )));
        }

        let overrides = PromptConfig::new()
            .with_output("object")
            .with_schema(evaluation.result_type.response_schema());

        let run = self.runner.run(
            RunChain::new(
                Box::new(StaticChain::new(evaluation.prompt.clone())),
                workspace,
                build_providers_map(providers),
                ErrorableType::EvaluationResult,
                LogSources::Evaluation,
            )
            .with_config_overrides(overrides),
        );
        let errorable_uuid = run.errorable_uuid;
        let chain = run.response.await?;

        let (result, reason, provider_log_uuid) = match &chain.outcome {
            Ok(output) => {
                let object = match &output.response {
                    AiResult::Object(object) => object.object.clone(),
                    AiResult::Text(_) => None,
                };

                self.publisher.publish_later(Event::EvaluationRun(EvaluationRunData {
                    workspace_id: evaluation.workspace_id,
                    evaluation_id: evaluation.id,
                    document_uuid: document_log.document_uuid,
                    document_log_uuid: document_log.uuid,
                    provider_log_uuid: Some(output.provider_log_uuid),
                    response: object.clone(),
                }));

                let Some(object) = object else {
                    warn!(%errorable_uuid, "Evaluation response was not valid JSON");
                    return Err(DomainError::validation(INVALID_JSON_MESSAGE));
                };

                let (result, reason) = split_result(object);
                (result, reason, Some(output.provider_log_uuid))
            }
            Err(_) => (None, None, None),
        };

        let evaluation_result = self
            .records
            .create_evaluation_result(NewEvaluationResult {
                uuid: errorable_uuid,
                evaluation_id: evaluation.id,
                document_log_uuid: document_log.uuid,
                provider_log_uuid,
                result_type: evaluation.result_type,
                result,
                reason,
                source: document_log.source,
            })
            .await?;

        self.publisher
            .publish_later(Event::EvaluationResultCreated(EvaluationResultCreatedData {
                workspace_id: evaluation.workspace_id,
                evaluation_result: evaluation_result.clone(),
            }));
        info!(%errorable_uuid, evaluation_id = evaluation.id, "Evaluation result created");

        Ok(EvaluationRun {
            errorable_uuid,
            chain,
            evaluation_result,
        })
    }
}

fn split_result(object: Value) -> (Option<Value>, Option<String>) {
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    let result = object.get("result").cloned();
    (result, reason)
}
