//! Storage factory for runtime storage selection

use std::sync::Arc;

use crate::domain::provider_log::ProviderLogRepository;
use crate::domain::run_error::RunErrorRepository;
use crate::domain::runs::RunRecordRepository;
use crate::domain::DomainError;

use super::in_memory::InMemoryRunStore;
use super::postgres::{PostgresConfig, PostgresRunStore};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl std::str::FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(DomainError::configuration(format!(
                "Unknown storage type: {}. Valid types: in_memory, postgres",
                s
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// The repositories of one store, all backed by the same database
#[derive(Clone)]
pub struct RunStores {
    pub run_errors: Arc<dyn RunErrorRepository>,
    pub provider_logs: Arc<dyn ProviderLogRepository>,
    pub records: Arc<dyn RunRecordRepository>,
}

impl std::fmt::Debug for RunStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStores").finish_non_exhaustive()
    }
}

impl RunStores {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RunErrorRepository + ProviderLogRepository + RunRecordRepository + 'static,
    {
        Self {
            run_errors: store.clone(),
            provider_logs: store.clone(),
            records: store,
        }
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates the run stores; PostgreSQL schemas are migrated on connect
    pub async fn create(config: &StorageConfig) -> Result<RunStores, DomainError> {
        match config {
            StorageConfig::InMemory => Ok(Self::create_in_memory().1),
            StorageConfig::Postgres(pg_config) => {
                let store = PostgresRunStore::connect(pg_config).await?;
                store.ensure_schema().await?;
                Ok(RunStores::from_store(Arc::new(store)))
            }
        }
    }

    /// Creates an in-memory store, also returned concretely for inspection
    pub fn create_in_memory() -> (Arc<InMemoryRunStore>, RunStores) {
        let store = Arc::new(InMemoryRunStore::new());
        (store.clone(), RunStores::from_store(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("in_memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("postgresql".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert_eq!("pg".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert!("sqlite".parse::<StorageType>().is_err());
    }

    #[test]
    fn test_storage_config_types() {
        assert_eq!(StorageConfig::in_memory().storage_type(), StorageType::InMemory);

        let postgres = StorageConfig::postgres(PostgresConfig::new("postgres://localhost/test"));
        assert_eq!(postgres.storage_type(), StorageType::Postgres);
    }

    #[tokio::test]
    async fn test_in_memory_stores_share_state() {
        let (store, stores) = StorageFactory::create_in_memory();
        let log = crate::domain::provider_log::fixtures::new_provider_log();

        stores.provider_logs.create(log.clone(), 0).await.unwrap();

        assert_eq!(store.provider_logs().unwrap().len(), 1);
    }
}
