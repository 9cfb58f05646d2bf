use clap::Parser;
use prompt_chain_runner::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(args).await,
        Command::Migrate(args) => cli::migrate::run(args).await,
    }
}
