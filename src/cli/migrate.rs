//! Migrate command - manages the PostgreSQL schema

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::infrastructure::storage::{
    revert_last_migration, run_storage_migrations, PostgresConfig, PostgresRunStore,
};

/// Arguments for the migrate command
#[derive(Args, Clone, Debug)]
pub struct MigrateArgs {
    /// Overrides `storage.postgres_url`
    #[arg(long)]
    pub database_url: Option<String>,

    /// Revert the most recent migration instead
    #[arg(long)]
    pub revert: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let url = args
        .database_url
        .or(config.storage.postgres_url)
        .context("A PostgreSQL url is required (--database-url or storage.postgres_url)")?;

    let store = PostgresRunStore::connect(&PostgresConfig::new(url)).await?;

    if args.revert {
        match revert_last_migration(store.pool()).await? {
            Some(version) => info!(version, "Migration reverted"),
            None => info!("No migration to revert"),
        }
        return Ok(());
    }

    let applied = run_storage_migrations(store.pool()).await?;
    info!(applied, "Migrations complete");

    Ok(())
}
