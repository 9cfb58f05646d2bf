//! Quota domain - Daily free-run limits on the shared default provider

mod free_runs;
mod guard;

pub use free_runs::FreeRunsManager;
pub use guard::{ProviderQuotaGuard, DEFAULT_PROVIDER_MAX_FREE_RUNS};
