//! Redis counting cache implementation

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::CountingCache;
use crate::domain::DomainError;

/// Counters outlive their day so late readers still see them
const COUNTER_TTL_SECS: i64 = 2 * 24 * 3600;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Shared counting cache backed by Redis `INCR`
#[derive(Clone)]
pub struct RedisCountingCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCountingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCountingCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCountingCache {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl CountingCache for RedisCountingCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        conn.get(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))
    }

    async fn incr(&self, key: &str) -> Result<i64, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        // INCR and EXPIRE travel in one MULTI/EXEC round-trip
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .incr(&prefixed_key, 1)
            .expire(&prefixed_key, COUNTER_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to increment key '{}': {}", key, e)))?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_prefix() {
        let config = RedisCacheConfig::new("redis://localhost:6379").with_key_prefix("runner");

        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key_prefix.as_deref(), Some("runner"));
    }
}
