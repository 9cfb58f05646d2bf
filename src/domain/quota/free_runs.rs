use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::domain::cache::{default_provider_run_count_key, CountingCache};
use crate::domain::DomainError;

/// Reads and bumps the per-workspace daily free-run counter
#[derive(Debug, Clone)]
pub struct FreeRunsManager {
    cache: Arc<dyn CountingCache>,
}

impl FreeRunsManager {
    pub fn new(cache: Arc<dyn CountingCache>) -> Self {
        Self { cache }
    }

    pub async fn free_runs(&self, workspace_id: i64) -> Result<Option<i64>, DomainError> {
        self.free_runs_on(workspace_id, Utc::now().date_naive()).await
    }

    pub async fn free_runs_on(
        &self,
        workspace_id: i64,
        date: NaiveDate,
    ) -> Result<Option<i64>, DomainError> {
        self.cache
            .get(&default_provider_run_count_key(workspace_id, date))
            .await
    }

    pub async fn incr_free_runs(&self, workspace_id: i64) -> Result<i64, DomainError> {
        self.incr_free_runs_on(workspace_id, Utc::now().date_naive())
            .await
    }

    pub async fn incr_free_runs_on(
        &self,
        workspace_id: i64,
        date: NaiveDate,
    ) -> Result<i64, DomainError> {
        self.cache
            .incr(&default_provider_run_count_key(workspace_id, date))
            .await
    }
}
