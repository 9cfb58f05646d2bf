//! Storage infrastructure - Run store implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{RunStores, StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryRunStore;
pub use migrations::{revert_last_migration, run_storage_migrations, Migration, PostgresMigrator};
pub use postgres::{PostgresConfig, PostgresRunStore};
