//! Pipeline requests and cancellation

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tenantry_core::domain::pipeline::{DeployTarget, Platform, PlatformReport};
use tenantry_core::domain::version::VersionStrategy;
use tenantry_core::{Error, Result};

/// Shared flag checked between pipeline phases
///
/// Clones observe the same flag, so a signal handler can hold one while the
/// pipeline holds another.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A full build-and-deploy run
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub tenant_id: String,
    pub platforms: Vec<Platform>,
    /// One target per platform, or empty for a build-only run
    pub targets: BTreeMap<Platform, DeployTarget>,
    pub version: VersionStrategy,
    /// Reuse the screenshots already on disk instead of generating new ones
    pub skip_screenshots: bool,
}

impl DeployRequest {
    /// Request deploying every platform to the same target
    pub fn new(tenant_id: impl Into<String>, platforms: Vec<Platform>, target: Option<DeployTarget>) -> Self {
        let targets = match target {
            Some(target) => platforms.iter().map(|p| (*p, target)).collect(),
            None => BTreeMap::new(),
        };
        Self {
            tenant_id: tenant_id.into(),
            platforms,
            targets,
            version: VersionStrategy::AutoIncrement,
            skip_screenshots: false,
        }
    }

    pub fn with_version(mut self, version: VersionStrategy) -> Self {
        self.version = version;
        self
    }

    pub fn with_target(mut self, platform: Platform, target: DeployTarget) -> Self {
        self.targets.insert(platform, target);
        self
    }

    pub fn skip_screenshots(mut self, skip: bool) -> Self {
        self.skip_screenshots = skip;
        self
    }

    /// Checks the platform and target selection
    pub fn validate(&self) -> Result<()> {
        validate_platforms(&self.platforms)?;

        if let Some(platform) = self.targets.keys().find(|p| !self.platforms.contains(p)) {
            return Err(Error::validation(format!(
                "A target was given for {} but {} is not selected",
                platform, platform
            )));
        }

        if !self.targets.is_empty()
            && let Some(platform) = self.platforms.iter().find(|p| !self.targets.contains_key(p))
        {
            return Err(Error::validation(format!(
                "No deploy target selected for {}",
                platform
            )));
        }

        Ok(())
    }
}

/// Submit or promote a build that is already in the stores
#[derive(Debug, Clone)]
pub struct ExistingBuildRequest {
    pub tenant_id: String,
    pub platforms: Vec<Platform>,
    /// Store build identifier, as shown by the store consoles
    pub build_id: String,
}

impl ExistingBuildRequest {
    pub fn new(tenant_id: impl Into<String>, platforms: Vec<Platform>, build_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            platforms,
            build_id: build_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_platforms(&self.platforms)?;
        if self.build_id.trim().is_empty() {
            return Err(Error::validation("Build identifier cannot be empty"));
        }
        Ok(())
    }
}

/// Return a tenant to an earlier release
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub tenant_id: String,
    /// Release tag to return to; defaults to the release before the latest
    pub tag: Option<String>,
    /// Rebuild and upload from the tag to these targets
    pub redeploy: BTreeMap<Platform, DeployTarget>,
}

impl RollbackRequest {
    pub fn new(tenant_id: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tag,
            redeploy: BTreeMap::new(),
        }
    }

    pub fn with_redeploy(mut self, platform: Platform, target: DeployTarget) -> Self {
        self.redeploy.insert(platform, target);
        self
    }
}

/// What a rollback did
#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub tenant_id: String,
    pub tag: String,
    pub marker: String,
    /// Redeploy progress, empty when nothing was redeployed
    pub platforms: Vec<PlatformReport>,
}

impl RollbackReport {
    /// Whether every requested redeploy went through
    pub fn is_success(&self) -> bool {
        self.platforms.iter().all(PlatformReport::deployed)
    }
}

fn validate_platforms(platforms: &[Platform]) -> Result<()> {
    if platforms.is_empty() {
        return Err(Error::validation("At least one platform must be selected"));
    }
    for (idx, platform) in platforms.iter().enumerate() {
        if platforms[..idx].contains(platform) {
            return Err(Error::validation(format!("{} is selected twice", platform)));
        }
    }
    Ok(())
}
