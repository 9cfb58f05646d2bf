//! Run command - executes a compiled chain from JSON files

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::domain::chain::{ChainEvent, CompiledPrompt};
use crate::domain::provider::ProviderApiKey;
use crate::domain::provider_log::ProviderLogRepository;
use crate::domain::runs::RunDocument;
use crate::domain::workspace::{LogSources, Workspace};

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Compiled chain: `{ raw_text, config, steps: [{ messages, config }] }`
    #[arg(long)]
    pub chain: PathBuf,

    /// Provider credentials: `[{ id, workspace_id, provider, name, token, url }]`
    #[arg(long)]
    pub providers: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub workspace_id: i64,

    /// Hand provider logs to the background job queue
    #[arg(long)]
    pub async_logs: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Run the chain, streaming text deltas to stdout
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = super::bootstrap();
    if args.async_logs {
        config.runner.save_sync_provider_logs = false;
    }

    let prompt: CompiledPrompt = read_json(&args.chain)?;
    let providers: Vec<ProviderApiKey> = read_json(&args.providers)?;

    let pipeline = crate::build_pipeline(&config).await?;
    let run = pipeline.document_runner.run_document(RunDocument {
        workspace: Workspace::new(args.workspace_id, format!("workspace-{}", args.workspace_id)),
        document_uuid: Uuid::new_v4(),
        commit_uuid: Uuid::new_v4(),
        prompt,
        parameters: Map::new(),
        source: LogSources::User,
        providers,
    });
    info!(document_log_uuid = %run.document_log_uuid, "Chain run started");

    let mut stdout = std::io::stdout();
    let mut stream = run.stream;
    while let Some(event) = stream.next().await {
        if let ChainEvent::TextDelta { delta, .. } = event {
            stdout.write_all(delta.as_bytes())?;
            stdout.flush()?;
        }
    }
    writeln!(stdout)?;

    let response = run.response.await?;
    let stores = pipeline.shutdown().await;

    let summary = match response.chain.outcome {
        Ok(output) => {
            let provider_log = match output.provider_log {
                Some(log) => Some(log),
                None => stores.provider_logs.find_by_uuid(&output.provider_log_uuid).await?,
            };
            json!({
                "documentLogUuid": response.document_log.uuid,
                "steps": output.steps,
                "providerLog": provider_log,
            })
        }
        Err(error) => json!({
            "documentLogUuid": response.document_log.uuid,
            "providerLogUuid": response.chain.provider_log_uuid,
            "error": {
                "code": error.code(),
                "message": error.message(),
                "details": error.details(),
                "runErrorId": error.db_error().map(|e| e.id),
            },
        }),
    };

    print_json(&summary)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
