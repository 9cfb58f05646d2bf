//! Cache factory for runtime selection

use std::sync::Arc;

use crate::domain::cache::CountingCache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCacheConfig, InMemoryCountingCache};
use super::redis::{RedisCacheConfig, RedisCountingCache};

/// Supported cache types
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CacheType {
    /// In-memory cache using moka
    #[default]
    InMemory,
    /// Redis cache
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for cache factory
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Type of cache to create
    pub cache_type: CacheType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Maximum number of counters (in-memory only)
    pub max_capacity: Option<u64>,
}

impl CacheConfig {
    /// Creates a new configuration for in-memory cache
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a new configuration for Redis cache
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Factory for creating counting cache instances
#[derive(Debug)]
pub struct CacheFactory;

impl CacheFactory {
    pub async fn create(config: &CacheConfig) -> Result<Arc<dyn CountingCache>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => {
                let mut in_memory = InMemoryCacheConfig::default();

                if let Some(capacity) = config.max_capacity {
                    in_memory = in_memory.with_max_capacity(capacity);
                }

                Ok(Arc::new(InMemoryCountingCache::with_config(in_memory)))
            }
            CacheType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for Redis cache")
                })?;

                let mut redis = RedisCacheConfig::new(url);

                if let Some(prefix) = &config.key_prefix {
                    redis = redis.with_key_prefix(prefix);
                }

                Ok(Arc::new(RedisCountingCache::new(redis).await?))
            }
        }
    }
}
