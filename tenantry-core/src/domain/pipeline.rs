//! Pipeline domain types
//!
//! A pipeline run only exists in memory for the duration of one invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::version::AppVersion;
use crate::error::Error;

/// Mobile platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Android, Platform::Ios];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(Error::validation(format!(
                "Unknown platform '{}': expected android or ios",
                other
            ))),
        }
    }
}

/// Store destination for an upload
///
/// On Android these map to Play tracks (internal, closed testing,
/// production); on iOS to TestFlight internal, TestFlight external and
/// App Store review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployTarget {
    Internal,
    Beta,
    Production,
}

impl DeployTarget {
    /// Whether the target is visible to the public store listing
    pub fn is_public_store(&self) -> bool {
        matches!(self, DeployTarget::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployTarget::Internal => "internal",
            DeployTarget::Beta => "beta",
            DeployTarget::Production => "production",
        }
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" | "testflight" => Ok(DeployTarget::Internal),
            "beta" | "closed" => Ok(DeployTarget::Beta),
            "production" | "prod" | "appstore" => Ok(DeployTarget::Production),
            other => Err(Error::validation(format!(
                "Unknown deploy target '{}': expected internal, beta or production",
                other
            ))),
        }
    }
}

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Validate,
    Setup,
    Screenshots,
    Build,
    Deploy,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validate => "Validate",
            Phase::Setup => "Setup",
            Phase::Screenshots => "Screenshots",
            Phase::Build => "Build",
            Phase::Deploy => "Deploy",
            Phase::Finalize => "Finalize",
        };
        f.write_str(name)
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed { phase: Phase, error: Error },
    Cancelled { phase: Phase },
}

/// A single pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub tenant_id: String,
    pub platforms: Vec<Platform>,
    pub targets: BTreeMap<Platform, DeployTarget>,
    pub version: Option<AppVersion>,
    pub started_at: DateTime<Utc>,
    pub phase: Phase,
}

impl PipelineRun {
    pub fn new(
        tenant_id: impl Into<String>,
        platforms: Vec<Platform>,
        targets: BTreeMap<Platform, DeployTarget>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            platforms,
            targets,
            version: None,
            started_at: Utc::now(),
            phase: Phase::Validate,
        }
    }

    /// Whether any selected target is a public store listing
    pub fn has_public_store_target(&self) -> bool {
        self.targets.values().any(DeployTarget::is_public_store)
    }

    /// Whether any selected target is production
    pub fn has_production_target(&self) -> bool {
        self.targets
            .values()
            .any(|t| matches!(t, DeployTarget::Production))
    }
}

/// A built store artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub platform: Platform,
    pub path: PathBuf,
}

/// What to do with a build that is already in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExistingBuildAction {
    /// Send the build to store review for the public listing
    SubmitForReview,
    /// Move the build to the target track
    Promote,
}

impl fmt::Display for ExistingBuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExistingBuildAction::SubmitForReview => f.write_str("submit for review"),
            ExistingBuildAction::Promote => f.write_str("promote"),
        }
    }
}

/// What a deploy uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploySource {
    /// An artifact produced by this run
    Built(Artifact),
    /// A build already uploaded to the store, by its identifier
    Existing {
        build_id: String,
        action: ExistingBuildAction,
    },
}

/// Deploy result for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    NotAttempted,
    Succeeded { target: DeployTarget },
    Failed { target: DeployTarget, error: String },
}

/// Per-platform progress of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform: Platform,
    pub artifact: Option<Artifact>,
    pub build_error: Option<String>,
    pub deploy: DeployStatus,
}

impl PlatformReport {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            artifact: None,
            build_error: None,
            deploy: DeployStatus::NotAttempted,
        }
    }

    pub fn deployed(&self) -> bool {
        matches!(self.deploy, DeployStatus::Succeeded { .. })
    }
}

/// Everything observable about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: PipelineRun,
    pub outcome: RunOutcome,
    pub platforms: Vec<PlatformReport>,
    pub screenshots: Option<usize>,
    pub release_tag: Option<String>,
    pub flags_updated: bool,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformReport> {
        self.platforms.iter().find(|p| p.platform == platform)
    }

    /// Whether some but not all deploys succeeded
    pub fn is_partially_deployed(&self) -> bool {
        let deployed = self.platforms.iter().filter(|p| p.deployed()).count();
        deployed > 0 && deployed < self.platforms.len()
    }
}

/// Events reported to the notification boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    Started {
        tenant_id: String,
        run_id: Uuid,
        platforms: Vec<Platform>,
    },
    Succeeded {
        tenant_id: String,
        run_id: Uuid,
        version: Option<AppVersion>,
        release_tag: Option<String>,
    },
    Failed {
        tenant_id: String,
        run_id: Uuid,
        phase: Phase,
        error: String,
        deployed: Vec<Platform>,
    },
    Cancelled {
        tenant_id: String,
        run_id: Uuid,
        phase: Phase,
    },
    RolledBack {
        tenant_id: String,
        tag: String,
        marker: String,
        redeployed: Vec<Platform>,
        redeploy_failed: Vec<Platform>,
    },
    RollbackFailed {
        tenant_id: String,
        tag: Option<String>,
        error: String,
    },
}

impl PipelineEvent {
    pub fn tenant_id(&self) -> &str {
        match self {
            PipelineEvent::Started { tenant_id, .. }
            | PipelineEvent::Succeeded { tenant_id, .. }
            | PipelineEvent::Failed { tenant_id, .. }
            | PipelineEvent::Cancelled { tenant_id, .. }
            | PipelineEvent::RolledBack { tenant_id, .. }
            | PipelineEvent::RollbackFailed { tenant_id, .. } => tenant_id,
        }
    }

    /// Plain-text rendering used by notifiers
    pub fn summary(&self) -> String {
        match self {
            PipelineEvent::Started {
                tenant_id,
                platforms,
                ..
            } => format!(
                "[{}] Deploy started for {}",
                tenant_id,
                join_platforms(platforms)
            ),
            PipelineEvent::Succeeded {
                tenant_id,
                version,
                release_tag,
                ..
            } => {
                let mut text = format!("[{}] Pipeline succeeded", tenant_id);
                if let Some(version) = version {
                    text.push_str(&format!(", version {}", version));
                }
                if let Some(tag) = release_tag {
                    text.push_str(&format!(", tagged {}", tag));
                }
                text
            }
            PipelineEvent::Failed {
                tenant_id,
                phase,
                error,
                deployed,
                ..
            } => {
                let mut text = format!("[{}] Pipeline failed in {}: {}", tenant_id, phase, error);
                if !deployed.is_empty() {
                    text.push_str(&format!(
                        " (deployed anyway: {})",
                        join_platforms(deployed)
                    ));
                }
                text
            }
            PipelineEvent::Cancelled {
                tenant_id, phase, ..
            } => format!("[{}] Pipeline cancelled before {}", tenant_id, phase),
            PipelineEvent::RolledBack {
                tenant_id,
                tag,
                marker,
                redeployed,
                redeploy_failed,
            } => {
                let mut text = format!("[{}] Rolled back to {} (marker {})", tenant_id, tag, marker);
                if !redeployed.is_empty() {
                    text.push_str(&format!(", redeployed: {}", join_platforms(redeployed)));
                }
                if !redeploy_failed.is_empty() {
                    text.push_str(&format!(
                        ", redeploy failed: {}",
                        join_platforms(redeploy_failed)
                    ));
                }
                text
            }
            PipelineEvent::RollbackFailed {
                tenant_id,
                tag,
                error,
            } => match tag {
                Some(tag) => format!("[{}] Rollback to {} failed: {}", tenant_id, tag, error),
                None => format!("[{}] Rollback failed: {}", tenant_id, error),
            },
        }
    }
}

fn join_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
