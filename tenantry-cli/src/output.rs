//! Terminal rendering of pipeline results

use colored::*;
use tenantry_core::Error;
use tenantry_core::domain::pipeline::{DeployStatus, PlatformReport, RunOutcome, RunReport};

/// Prints a finished run
pub fn print_report(report: &RunReport) {
    println!();
    println!("{}", "Run Summary:".bold());
    println!("  Run:      {}", report.run.id.to_string().dimmed());
    println!("  Tenant:   {}", report.run.tenant_id.cyan());
    if let Some(version) = &report.run.version {
        println!("  Version:  {}", version);
    }
    if let Some(count) = report.screenshots {
        println!("  Screens:  {}", count);
    }
    let duration = report
        .finished_at
        .signed_duration_since(report.run.started_at)
        .num_seconds();
    println!("  Duration: {}s", duration);

    println!("\n{}", "Platforms:".bold());
    for platform in &report.platforms {
        print_platform(platform);
    }

    if let Some(tag) = &report.release_tag {
        println!("\n  {} Tagged {}", "✓".green(), tag.cyan());
    }
    if report.flags_updated {
        println!("  {} Release flags updated", "✓".green());
    }

    println!();
    match &report.outcome {
        RunOutcome::Succeeded => println!("{}", "✓ Pipeline succeeded".green().bold()),
        RunOutcome::Failed { phase, error } => {
            println!(
                "{} {}",
                format!("✗ Pipeline failed in {}:", phase).red().bold(),
                error
            );
            if report.is_partially_deployed() {
                println!(
                    "{}",
                    "  Some platforms were deployed, see above.".yellow()
                );
            }
            print_remediation_for(error);
        }
        RunOutcome::Cancelled { phase } => {
            println!("{}", format!("⚠ Pipeline cancelled before {}", phase).yellow().bold())
        }
    }
}

/// Prints one platform line of a report
pub fn print_platform(platform: &PlatformReport) {
    let status = match &platform.deploy {
        DeployStatus::Succeeded { target } => format!("deployed to {}", target).green(),
        DeployStatus::Failed { target, error } => {
            format!("deploy to {} failed: {}", target, error).red()
        }
        DeployStatus::NotAttempted => match &platform.build_error {
            Some(error) => format!("build failed: {}", error).red(),
            None if platform.artifact.is_some() => "built".normal(),
            None => "not built".dimmed(),
        },
    };
    println!("  {} {:<8} {}", "▸".cyan(), platform.platform.as_str(), status);
    if let Some(artifact) = &platform.artifact {
        println!("             {}", artifact.path.display().to_string().dimmed());
    }
}

/// Prints remediation steps when the error is a state conflict
pub fn print_remediation(err: &anyhow::Error) {
    if let Some(error) = err.downcast_ref::<Error>() {
        print_remediation_for(error);
    }
}

fn print_remediation_for(error: &Error) {
    if let Some(conflict) = error.conflict() {
        println!("\n{}", "To resolve:".yellow().bold());
        for line in conflict.remediation().lines() {
            println!("  {}", line.dimmed());
        }
    }
}
