use async_trait::async_trait;

use super::{NewRunError, RunError};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for run errors
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunErrorRepository: Send + Sync {
    /// Stores a run error and returns the persisted row
    async fn create(&self, error: NewRunError) -> Result<RunError, DomainError>;
}
