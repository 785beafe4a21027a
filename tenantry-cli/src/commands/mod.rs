//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod keystore;
mod release;
mod tenant;

pub use deploy::{DeployArgs, ExistingBuildArgs, RollbackArgs};
pub use keystore::KeystoreCommands;
pub use tenant::TenantCommands;

use anyhow::Result;
use clap::Subcommand;
use tenantry_core::domain::version::VersionBump;
use tenantry_orchestrator::{CancellationFlag, PipelineOrchestrator};

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build and deploy a tenant
    Deploy(DeployArgs),
    /// Submit an already-uploaded build for store review
    Submit(ExistingBuildArgs),
    /// Promote an already-uploaded build to production
    Promote(ExistingBuildArgs),
    /// Roll a tenant back to an earlier release
    Rollback(RollbackArgs),
    /// List a tenant's release tags
    Tags {
        /// Tenant identifier
        tenant: String,
    },
    /// Check out a tenant's deploy branch, creating it if needed
    Branch {
        /// Tenant identifier
        tenant: String,
    },
    /// Show the app version, or preview a bump
    Version {
        /// Bump to preview (build, patch, minor, major)
        #[arg(long)]
        bump: Option<VersionBump>,
    },
    /// Tenant configuration and directory
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Android signing material
    Keystore {
        #[command(subcommand)]
        command: KeystoreCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `orchestrator` - Pipeline and services
/// * `cancel` - Set when the operator interrupts
pub async fn handle_command(
    command: Commands,
    orchestrator: &PipelineOrchestrator,
    cancel: &CancellationFlag,
) -> Result<()> {
    match command {
        Commands::Deploy(args) => deploy::handle_deploy(args, orchestrator, cancel).await,
        Commands::Submit(args) => deploy::handle_submit(args, orchestrator, cancel).await,
        Commands::Promote(args) => deploy::handle_promote(args, orchestrator, cancel).await,
        Commands::Rollback(args) => deploy::handle_rollback(args, orchestrator).await,
        Commands::Tags { tenant } => release::list_tags(orchestrator, &tenant).await,
        Commands::Branch { tenant } => release::ensure_branch(orchestrator, &tenant).await,
        Commands::Version { bump } => release::show_version(orchestrator, bump),
        Commands::Tenant { command } => tenant::handle_tenant_command(command, orchestrator).await,
        Commands::Keystore { command } => {
            keystore::handle_keystore_command(command, orchestrator).await
        }
    }
}
