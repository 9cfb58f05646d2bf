//! Cache domain - Shared counting cache abstraction

mod key;
mod repository;

pub use key::default_provider_run_count_key;
pub use repository::CountingCache;

#[cfg(test)]
pub use repository::mock::MockCountingCache;
