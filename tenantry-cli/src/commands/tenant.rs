//! Tenant command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use tenantry_orchestrator::PipelineOrchestrator;

/// Tenant subcommands
#[derive(Subcommand)]
pub enum TenantCommands {
    /// List configured tenants
    List,
    /// Check a tenant's configuration, credentials and signing material
    Validate {
        /// Tenant identifier
        tenant: String,
    },
    /// Mark a tenant active in the tenant directory
    Activate {
        /// Tenant identifier
        tenant: String,
    },
    /// Mark a tenant inactive; inactive tenants cannot be deployed
    Deactivate {
        /// Tenant identifier
        tenant: String,
    },
}

/// Handle tenant commands
pub async fn handle_tenant_command(
    command: TenantCommands,
    orchestrator: &PipelineOrchestrator,
) -> Result<()> {
    match command {
        TenantCommands::List => list_tenants(orchestrator),
        TenantCommands::Validate { tenant } => validate_tenant(orchestrator, &tenant).await,
        TenantCommands::Activate { tenant } => set_active(orchestrator, &tenant, true).await,
        TenantCommands::Deactivate { tenant } => set_active(orchestrator, &tenant, false).await,
    }
}

fn list_tenants(orchestrator: &PipelineOrchestrator) -> Result<()> {
    let tenants = orchestrator.tenants().list()?;
    if tenants.is_empty() {
        println!("{}", "No tenants configured".yellow());
        return Ok(());
    }

    println!("{}", format!("Tenants ({}):", tenants.len()).bold());
    for tenant in &tenants {
        match orchestrator.tenants().load(tenant) {
            Ok(config) => println!(
                "  {} {:<16} {}",
                "▸".cyan(),
                tenant,
                config.display_name().dimmed()
            ),
            Err(e) => println!("  {} {:<16} {}", "✗".red(), tenant, e.to_string().red()),
        }
    }
    Ok(())
}

async fn validate_tenant(orchestrator: &PipelineOrchestrator, tenant: &str) -> Result<()> {
    let tenants = orchestrator.tenants();
    let config = tenants.load(tenant)?;
    println!("{} Configuration {}", "✓".green(), tenants.config_path(tenant).display());

    tenants.check_credentials(tenant, &config)?;
    println!("{} Backend credentials present", "✓".green());

    match orchestrator.keystores().validate(tenant) {
        Ok(props) => println!("{} Signing key '{}'", "✓".green(), props.key_alias),
        Err(e) => println!("{} Signing material: {}", "⚠".yellow(), e),
    }

    if orchestrator.directory().has_master() {
        match orchestrator.directory().record(tenant).await? {
            Some(record) if record.active => println!("{} Active in directory", "✓".green()),
            Some(_) => println!("{} Inactive in directory", "✗".red()),
            None => println!("{} Not registered in directory", "⚠".yellow()),
        }
    }

    Ok(())
}

async fn set_active(orchestrator: &PipelineOrchestrator, tenant: &str, active: bool) -> Result<()> {
    orchestrator.tenants().load(tenant)?;
    orchestrator.directory().set_active(tenant, active).await?;

    let state = if active { "active" } else { "inactive" };
    println!("{} Marked {} {}", "✓".green(), tenant.cyan(), state);
    Ok(())
}
