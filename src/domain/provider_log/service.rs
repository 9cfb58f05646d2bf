use std::sync::Arc;

use tracing::{debug, instrument};

use super::{CreatedProviderLog, NewProviderLog, ProviderLogRepository};
use crate::domain::events::{Event, EventPublisher};
use crate::domain::usage::estimate_cost;
use crate::domain::DomainError;

/// Creates provider logs and announces them
#[derive(Clone)]
pub struct ProviderLogService {
    repository: Arc<dyn ProviderLogRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for ProviderLogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLogService").finish_non_exhaustive()
    }
}

impl ProviderLogService {
    pub fn new(
        repository: Arc<dyn ProviderLogRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    /// Persists `log`, deriving its cost from usage when none was supplied
    #[instrument(skip(self, log), fields(uuid = %log.data.uuid, model = %log.data.model))]
    pub async fn create_provider_log(
        &self,
        log: NewProviderLog,
    ) -> Result<CreatedProviderLog, DomainError> {
        let cost = log.cost_in_millicents.unwrap_or_else(|| {
            estimate_cost(log.data.provider_type, &log.data.model, &log.data.usage)
        });

        let created = self.repository.create(log, cost).await?;
        debug!(
            id = created.provider_log.id,
            cost_in_millicents = cost,
            "Provider log created"
        );

        self.publisher
            .publish_later(Event::ProviderLogCreated(created.provider_log.clone()));

        Ok(created)
    }
}
