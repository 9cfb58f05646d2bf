use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use super::FreeRunsManager;
use crate::domain::provider::ProviderApiKey;
use crate::domain::run_error::ChainError;
use crate::domain::workspace::Workspace;
use crate::domain::DomainError;

pub const DEFAULT_PROVIDER_MAX_FREE_RUNS: i64 = 1000;

/// Limits daily use of the platform's shared default credential
#[derive(Debug, Clone)]
pub struct ProviderQuotaGuard {
    free_runs: FreeRunsManager,
    max_free_runs: i64,
}

impl ProviderQuotaGuard {
    pub fn new(free_runs: FreeRunsManager) -> Self {
        Self {
            free_runs,
            max_free_runs: DEFAULT_PROVIDER_MAX_FREE_RUNS,
        }
    }

    pub fn with_max_free_runs(mut self, max_free_runs: i64) -> Self {
        self.max_free_runs = max_free_runs;
        self
    }

    pub fn max_free_runs(&self) -> i64 {
        self.max_free_runs
    }

    pub async fn check(
        &self,
        workspace: &Workspace,
        provider: &ProviderApiKey,
        default_provider_api_key: Option<&str>,
    ) -> Result<Result<(), ChainError>, DomainError> {
        self.check_on(
            workspace,
            provider,
            default_provider_api_key,
            Utc::now().date_naive(),
        )
        .await
    }

    /// Counts one run against `date` when `provider` is the default credential
    ///
    /// The outer error is an unreachable counting cache; the inner one is an
    /// exceeded quota.
    pub async fn check_on(
        &self,
        workspace: &Workspace,
        provider: &ProviderApiKey,
        default_provider_api_key: Option<&str>,
        date: NaiveDate,
    ) -> Result<Result<(), ChainError>, DomainError> {
        if default_provider_api_key != Some(provider.token.as_str()) {
            return Ok(Ok(()));
        }

        let runs = self.free_runs.incr_free_runs_on(workspace.id, date).await?;
        debug!(workspace_id = workspace.id, runs, "Default provider run counted");

        if runs > self.max_free_runs {
            warn!(
                workspace_id = workspace.id,
                runs,
                max = self.max_free_runs,
                "Default provider quota exceeded"
            );
            return Ok(Err(ChainError::quota_exceeded()));
        }

        Ok(Ok(()))
    }
}
