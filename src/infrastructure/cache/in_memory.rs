//! In-memory counting cache using moka

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::CountingCache;
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of counters
    pub max_capacity: u64,
    /// Counters are dropped this long after creation
    pub time_to_live: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            time_to_live: Duration::from_secs(2 * 24 * 3600),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }
}

/// Process-local counting cache
///
/// Each key owns one atomic counter; moka's `get_with` guarantees a single
/// counter is created per key even under concurrent first increments.
#[derive(Debug, Clone)]
pub struct InMemoryCountingCache {
    counters: MokaCache<String, Arc<AtomicI64>>,
}

impl InMemoryCountingCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let counters = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();

        Self { counters }
    }
}

impl Default for InMemoryCountingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CountingCache for InMemoryCountingCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, DomainError> {
        Ok(self
            .counters
            .get(key)
            .await
            .map(|counter| counter.load(Ordering::SeqCst)))
    }

    async fn incr(&self, key: &str) -> Result<i64, DomainError> {
        let counter = self
            .counters
            .get_with(key.to_string(), async { Arc::new(AtomicI64::new(0)) })
            .await;

        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
