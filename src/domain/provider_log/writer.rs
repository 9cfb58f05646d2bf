use std::sync::Arc;

use tracing::{debug, error};

use super::{CreatedProviderLog, NewProviderLog, ProviderErrorLink, ProviderLogData, ProviderLogService};
use crate::domain::chain::StreamConsumedResult;
use crate::domain::events::{Event, EventPublisher};
use crate::domain::jobs::JobQueue;
use crate::domain::llm::StreamType;
use crate::domain::run_error::Errorable;
use crate::domain::DomainError;

/// Input of [`ProviderLogWriter::save`]
#[derive(Debug, Clone)]
pub struct SaveProviderLog<'a> {
    pub data: ProviderLogData,
    pub stream_type: StreamType,
    pub save_sync: bool,
    pub consumed: &'a StreamConsumedResult,
    pub errorable: Errorable,
}

/// Persists provider logs inline or through the job queue
#[derive(Clone)]
pub struct ProviderLogWriter {
    service: ProviderLogService,
    job_queue: Arc<dyn JobQueue>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for ProviderLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLogWriter").finish_non_exhaustive()
    }
}

impl ProviderLogWriter {
    pub fn new(
        service: ProviderLogService,
        job_queue: Arc<dyn JobQueue>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            service,
            job_queue,
            publisher,
        }
    }

    /// Returns the created row on the synchronous path and `None` once the
    /// payload is queued on the asynchronous one
    pub async fn save(
        &self,
        request: SaveProviderLog<'_>,
    ) -> Result<Option<CreatedProviderLog>, DomainError> {
        let SaveProviderLog {
            data,
            stream_type,
            save_sync,
            consumed,
            errorable,
        } = request;

        self.publisher.publish_later(Event::AiProviderCallCompleted {
            log: data.clone(),
            stream_type,
            finish_reason: consumed.finish_reason,
        });

        let mut log = NewProviderLog::new(data, consumed.finish_reason);
        if let Some(ref chain_error) = consumed.error {
            log = log.with_provider_error(ProviderErrorLink {
                errorable_type: errorable.errorable_type,
                errorable_uuid: errorable.errorable_uuid,
                error_code: chain_error.code(),
                message: chain_error.message().to_string(),
            });
        }

        if save_sync {
            let created = self.service.create_provider_log(log).await.map_err(|e| {
                error!(error = %e, "Failed to persist provider log");
                e
            })?;
            return Ok(Some(created));
        }

        let uuid = log.data.uuid;
        self.job_queue.enqueue_create_provider_log_job(log).await?;
        debug!(%uuid, "Provider log queued");

        Ok(None)
    }
}
