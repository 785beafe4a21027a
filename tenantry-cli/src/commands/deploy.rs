//! Deploy command handlers
//!
//! Full runs, submit and promote of existing builds, and rollbacks.

use anyhow::{Result, bail};
use clap::Args;
use colored::*;
use tenantry_core::domain::pipeline::{DeployTarget, Platform, RunReport};
use tenantry_core::domain::version::{AppVersion, VersionBump, VersionStrategy};
use tenantry_orchestrator::{
    CancellationFlag, DeployRequest, ExistingBuildRequest, PipelineOrchestrator, RollbackRequest,
};

use crate::output::{print_platform, print_report};

#[derive(Args)]
pub struct DeployArgs {
    /// Tenant identifier
    tenant: String,

    /// Platforms to build (comma-separated)
    #[arg(short, long = "platform", value_delimiter = ',', default_values_t = Platform::ALL)]
    platforms: Vec<Platform>,

    /// Store target for every platform; omit for a build-only run
    #[arg(short, long)]
    target: Option<DeployTarget>,

    /// Store target for Android, overriding --target
    #[arg(long)]
    android_target: Option<DeployTarget>,

    /// Store target for iOS, overriding --target
    #[arg(long)]
    ios_target: Option<DeployTarget>,

    /// Explicit version, e.g. 1.4.0+52
    #[arg(long, conflicts_with = "bump")]
    set_version: Option<AppVersion>,

    /// Version bump (build, patch, minor, major); defaults to the build number
    #[arg(long)]
    bump: Option<VersionBump>,

    /// Reuse existing screenshots instead of capturing new ones
    #[arg(long)]
    skip_screenshots: bool,
}

impl DeployArgs {
    fn into_request(self) -> DeployRequest {
        let version = match (self.set_version, self.bump) {
            (Some(version), _) => VersionStrategy::Explicit(version),
            (None, Some(bump)) => VersionStrategy::Bump(bump),
            (None, None) => VersionStrategy::AutoIncrement,
        };

        let mut request = DeployRequest::new(self.tenant, self.platforms.clone(), self.target)
            .with_version(version)
            .skip_screenshots(self.skip_screenshots);

        let overrides = [
            (Platform::Android, self.android_target),
            (Platform::Ios, self.ios_target),
        ];
        for (platform, target) in overrides {
            if let Some(target) = target
                && self.platforms.contains(&platform)
            {
                request = request.with_target(platform, target);
            }
        }
        request
    }
}

#[derive(Args)]
pub struct ExistingBuildArgs {
    /// Tenant identifier
    tenant: String,

    /// Store build identifier
    build_id: String,

    /// Platforms (comma-separated)
    #[arg(short, long = "platform", value_delimiter = ',', default_values_t = Platform::ALL)]
    platforms: Vec<Platform>,
}

#[derive(Args)]
pub struct RollbackArgs {
    /// Tenant identifier
    tenant: String,

    /// Release tag to return to; defaults to the release before the latest
    #[arg(long)]
    tag: Option<String>,

    /// Rebuild from the tag and upload to this target
    #[arg(long)]
    redeploy: Option<DeployTarget>,

    /// Platforms to redeploy (comma-separated)
    #[arg(short, long = "platform", value_delimiter = ',', default_values_t = Platform::ALL)]
    platforms: Vec<Platform>,
}

/// Run the full pipeline
pub async fn handle_deploy(
    args: DeployArgs,
    orchestrator: &PipelineOrchestrator,
    cancel: &CancellationFlag,
) -> Result<()> {
    let request = args.into_request();
    println!(
        "{}",
        format!("Deploying {} ({})", request.tenant_id, join(&request.platforms)).bold()
    );

    let report = orchestrator.run(request, cancel).await;
    finish(&report)
}

/// Submit an existing build for store review
pub async fn handle_submit(
    args: ExistingBuildArgs,
    orchestrator: &PipelineOrchestrator,
    cancel: &CancellationFlag,
) -> Result<()> {
    println!(
        "{}",
        format!("Submitting build {} of {} for review", args.build_id, args.tenant).bold()
    );
    let request = ExistingBuildRequest::new(args.tenant, args.platforms, args.build_id);
    let report = orchestrator.submit_for_review(request, cancel).await;
    finish(&report)
}

/// Promote an existing build to production
pub async fn handle_promote(
    args: ExistingBuildArgs,
    orchestrator: &PipelineOrchestrator,
    cancel: &CancellationFlag,
) -> Result<()> {
    println!(
        "{}",
        format!("Promoting build {} of {} to production", args.build_id, args.tenant).bold()
    );
    let request = ExistingBuildRequest::new(args.tenant, args.platforms, args.build_id);
    let report = orchestrator.promote_to_production(request, cancel).await;
    finish(&report)
}

/// Roll back to an earlier release
pub async fn handle_rollback(args: RollbackArgs, orchestrator: &PipelineOrchestrator) -> Result<()> {
    let mut request = RollbackRequest::new(args.tenant, args.tag);
    if let Some(target) = args.redeploy {
        for platform in &args.platforms {
            request = request.with_redeploy(*platform, target);
        }
    }

    let report = orchestrator.rollback(request).await?;

    println!("{} Rolled {} back to {}", "✓".green(), report.tenant_id, report.tag.cyan());
    println!("  Marker: {}", report.marker.dimmed());
    if !report.platforms.is_empty() {
        println!("\n{}", "Redeploy:".bold());
        for platform in &report.platforms {
            print_platform(platform);
        }
    }

    if !report.is_success() {
        bail!("Rollback to {} succeeded but the redeploy failed", report.tag);
    }
    Ok(())
}

fn finish(report: &RunReport) -> Result<()> {
    print_report(report);
    if !report.is_success() {
        bail!("Run {} did not succeed", report.run.id);
    }
    Ok(())
}

fn join(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
