//! Tenantry CLI
//!
//! Command-line interface for building, deploying and rolling back
//! white-label tenant apps.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, handle_command};
use std::path::PathBuf;
use tenantry_orchestrator::{CancellationFlag, Config, PipelineOrchestrator};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tenantry")]
#[command(about = "White-label app deployment", long_about = None)]
struct Cli {
    /// Root of the white-label repository
    #[arg(long, env = "TENANTRY_REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// Log debug output unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose {
        "tenantry_orchestrator=debug,tenantry_cli=debug"
    } else {
        "tenantry_orchestrator=info,tenantry_cli=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env_with_root(cli.repo_root)
        .context("Failed to load configuration")?;
    let orchestrator =
        PipelineOrchestrator::from_config(config).context("Invalid configuration")?;

    let cancel = CancellationFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let result = handle_command(cli.command, &orchestrator, &cancel).await;

    if let Err(e) = orchestrator.shutdown().await {
        warn!("Failed to close backend handles: {}", e);
    }

    if let Err(err) = &result {
        output::print_remediation(err);
    }
    result
}
