use async_trait::async_trait;
use uuid::Uuid;

use super::{CreatedProviderLog, NewProviderLog, ProviderLog};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for provider logs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderLogRepository: Send + Sync {
    /// Writes one provider log as a single atomic unit
    ///
    /// Inserts the linked run error first when `log.provider_error` is set,
    /// then the provider log referencing it, then touches the provider
    /// credential and API key usage timestamps. Any failure rolls back
    /// every step.
    async fn create(
        &self,
        log: NewProviderLog,
        cost_in_millicents: u64,
    ) -> Result<CreatedProviderLog, DomainError>;

    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<ProviderLog>, DomainError>;

    /// Logs of a run, oldest first
    async fn list_by_document_log(
        &self,
        document_log_uuid: &Uuid,
    ) -> Result<Vec<ProviderLog>, DomainError>;
}
