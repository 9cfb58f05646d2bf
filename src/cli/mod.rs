//! CLI module for the prompt chain runner
//!
//! Provides subcommands:
//! - `run`: run a compiled chain and stream its output
//! - `migrate`: apply or revert the PostgreSQL schema

pub mod migrate;
pub mod run;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Prompt Chain Runner - validated, quota-guarded and logged LLM chains
#[derive(Parser)]
#[command(name = "prompt-chain-runner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a compiled chain against its providers
    Run(run::RunArgs),

    /// Apply pending PostgreSQL migrations
    Migrate(migrate::MigrateArgs),
}

/// Loads `.env` and layered configuration, then installs logging
fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    logging::init_logging(&config.logging);

    config
}
