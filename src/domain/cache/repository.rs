//! Counting cache trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Shared counter store
///
/// `incr` must be a single atomic operation against the backing store so
/// concurrent callers never lose updates.
#[async_trait]
pub trait CountingCache: Send + Sync + Debug {
    /// Reads a counter; `None` when it was never incremented
    async fn get(&self, key: &str) -> Result<Option<i64>, DomainError>;

    /// Increments a counter by one, returning the new value
    async fn incr(&self, key: &str) -> Result<i64, DomainError>;
}
