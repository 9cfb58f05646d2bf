use async_trait::async_trait;
use uuid::Uuid;

use super::{DocumentLog, EvaluationResult, NewDocumentLog, NewEvaluationResult};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for the records a run's outcome attaches to
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunRecordRepository: Send + Sync {
    async fn create_document_log(&self, log: NewDocumentLog) -> Result<DocumentLog, DomainError>;

    async fn find_document_log(&self, uuid: &Uuid) -> Result<Option<DocumentLog>, DomainError>;

    async fn create_evaluation_result(
        &self,
        result: NewEvaluationResult,
    ) -> Result<EvaluationResult, DomainError>;
}
