//! Jobs domain - Background work hand-off

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::provider_log::NewProviderLog;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Work executed outside the request path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "camelCase")]
pub enum Job {
    CreateProviderLog(NewProviderLog),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateProviderLog(_) => "createProviderLog",
        }
    }
}

/// Generic enqueue interface of the background job system
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), DomainError>;

    /// Queues the same payload the synchronous write path persists
    async fn enqueue_create_provider_log_job(
        &self,
        log: NewProviderLog,
    ) -> Result<(), DomainError> {
        self.enqueue(Job::CreateProviderLog(log)).await
    }
}
