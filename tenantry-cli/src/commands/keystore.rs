//! Keystore command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tenantry_orchestrator::PipelineOrchestrator;
use tenantry_orchestrator::service::KeystoreStatus;

/// Keystore subcommands
#[derive(Subcommand)]
pub enum KeystoreCommands {
    /// Generate an upload keystore if the tenant has none
    Ensure {
        /// Tenant identifier
        tenant: String,
    },
    /// Archive the current keystore and generate a new one
    Regenerate {
        /// Tenant identifier
        tenant: String,

        /// Confirm replacing existing signing material
        #[arg(long)]
        yes: bool,
    },
}

/// Handle keystore commands
pub async fn handle_keystore_command(
    command: KeystoreCommands,
    orchestrator: &PipelineOrchestrator,
) -> Result<()> {
    match command {
        KeystoreCommands::Ensure { tenant } => {
            let config = orchestrator.tenants().load(&tenant)?;
            let status = orchestrator.keystores().ensure(&tenant, &config).await?;
            let path = orchestrator.keystores().keystore_path(&tenant);
            match status {
                KeystoreStatus::Existing(_) => {
                    println!("{} Keystore already present", "✓".green());
                }
                KeystoreStatus::Generated(_) => {
                    println!("{} Generated keystore", "✓".green());
                }
            }
            println!("  {}", path.display().to_string().dimmed());
        }
        KeystoreCommands::Regenerate { tenant, yes } => {
            let config = orchestrator.tenants().load(&tenant)?;
            let (props, archive) = orchestrator
                .keystores()
                .regenerate(&tenant, &config, yes)
                .await?;

            if let Some(archive) = archive {
                println!(
                    "{} Archived previous material to {}",
                    "⚠".yellow(),
                    archive.display()
                );
            }
            println!("{} Generated keystore with alias '{}'", "✓".green(), props.key_alias);
            println!(
                "{}",
                "  Builds signed with the new key cannot update installs of the old one.".yellow()
            );
        }
    }
    Ok(())
}
