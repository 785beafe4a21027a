//! Release history, branch and version commands

use anyhow::Result;
use colored::*;
use tenantry_core::domain::release::is_rollback_tag;
use tenantry_core::domain::version::{VersionBump, VersionStrategy};
use tenantry_orchestrator::PipelineOrchestrator;

/// List release tags, oldest first, with rollback markers dimmed
pub async fn list_tags(orchestrator: &PipelineOrchestrator, tenant: &str) -> Result<()> {
    orchestrator.tenants().load(tenant)?;
    let tags = orchestrator.branches().list_release_tags(tenant).await?;

    if tags.is_empty() {
        println!("{}", format!("No releases for {}", tenant).yellow());
        return Ok(());
    }

    println!("{}", format!("Releases for {}:", tenant).bold());
    for tag in &tags {
        if is_rollback_tag(tag) {
            println!("    {}", tag.dimmed());
        } else {
            println!("  {} {}", "▸".cyan(), tag);
        }
    }
    Ok(())
}

pub async fn ensure_branch(orchestrator: &PipelineOrchestrator, tenant: &str) -> Result<()> {
    orchestrator.tenants().load(tenant)?;
    let branch = orchestrator.branches().ensure_deploy_branch(tenant).await?;
    println!("{} On {}", "✓".green(), branch.cyan());
    Ok(())
}

/// Show the manifest version, and the result of a bump when one is given
pub fn show_version(orchestrator: &PipelineOrchestrator, bump: Option<VersionBump>) -> Result<()> {
    let versions = orchestrator.versions();
    let current = versions.current()?;
    println!(
        "{} {}",
        current.to_string().cyan(),
        versions.manifest_path().display().to_string().dimmed()
    );

    if let Some(bump) = bump {
        let next = versions.preview(VersionStrategy::Bump(bump))?;
        println!("  {} {}", "→".dimmed(), next);
    }
    Ok(())
}
