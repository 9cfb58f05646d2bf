//! Cache infrastructure - Counting cache implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCacheConfig, InMemoryCountingCache};
pub use redis::{RedisCacheConfig, RedisCountingCache};
