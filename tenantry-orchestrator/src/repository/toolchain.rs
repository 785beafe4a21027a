//! Build toolchain repository
//!
//! Builds store artifacts and uploads them. The Flutter implementation runs
//! `pod install` before iOS builds, `flutter build` with the tenant compiled
//! in, and `fastlane` lanes for every store interaction.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenantry_core::domain::pipeline::{
    Artifact, DeploySource, DeployTarget, ExistingBuildAction, Platform,
};
use tenantry_core::{Error, Result};
use tracing::info;

use crate::process::CommandSpec;

/// Repository trait for the mobile build toolchain
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    /// Builds a release artifact of the app for one tenant
    async fn build(&self, platform: Platform, tenant_id: &str) -> Result<Artifact>;

    /// Uploads a build to a store target
    ///
    /// `source` is either an artifact built by this run or the identifier of
    /// a build that is already in the store.
    async fn deploy(
        &self,
        platform: Platform,
        target: DeployTarget,
        tenant_id: &str,
        source: &DeploySource,
    ) -> Result<()>;
}

/// Flutter + CocoaPods + fastlane implementation of BuildToolchain
pub struct FlutterToolchain {
    project_dir: PathBuf,
    dependency_timeout: Duration,
    build_timeout: Duration,
    deploy_timeout: Duration,
}

impl FlutterToolchain {
    /// Creates a toolchain rooted at a Flutter project
    ///
    /// # Arguments
    /// * `project_dir` - Directory containing `pubspec.yaml`
    /// * `dependency_timeout` - Bound on `pod install`
    /// * `build_timeout` - Bound on one `flutter build`
    /// * `deploy_timeout` - Bound on one fastlane lane
    pub fn new(
        project_dir: impl Into<PathBuf>,
        dependency_timeout: Duration,
        build_timeout: Duration,
        deploy_timeout: Duration,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            dependency_timeout,
            build_timeout,
            deploy_timeout,
        }
    }

    fn platform_dir(&self, platform: Platform) -> PathBuf {
        self.project_dir.join(platform.as_str())
    }

    async fn install_pods(&self) -> Result<()> {
        info!("Installing CocoaPods dependencies");
        CommandSpec::new("pod")
            .args(["install", "--repo-update"])
            .current_dir(self.platform_dir(Platform::Ios))
            .timeout(self.dependency_timeout)
            .run()
            .await?;
        Ok(())
    }

    /// Locates the artifact `flutter build` just produced
    fn find_artifact(&self, platform: Platform) -> Result<PathBuf> {
        let (dir, extension) = match platform {
            Platform::Android => (
                self.project_dir.join("build/app/outputs/bundle/release"),
                "aab",
            ),
            Platform::Ios => (self.project_dir.join("build/ios/ipa"), "ipa"),
        };
        find_with_extension(&dir, extension)
    }
}

#[async_trait]
impl BuildToolchain for FlutterToolchain {
    async fn build(&self, platform: Platform, tenant_id: &str) -> Result<Artifact> {
        if platform == Platform::Ios {
            self.install_pods().await?;
        }

        info!("Building {} release for {}", platform, tenant_id);
        CommandSpec::new("flutter")
            .args(build_args(platform, tenant_id))
            .current_dir(&self.project_dir)
            .timeout(self.build_timeout)
            .run()
            .await?;

        let path = self.find_artifact(platform)?;
        info!("Built {}", path.display());
        Ok(Artifact { platform, path })
    }

    async fn deploy(
        &self,
        platform: Platform,
        target: DeployTarget,
        tenant_id: &str,
        source: &DeploySource,
    ) -> Result<()> {
        let lane = lane_name(target, source);
        info!("Running fastlane {} for {} ({})", lane, tenant_id, platform);

        let mut command = CommandSpec::new("fastlane")
            .arg(lane)
            .current_dir(self.platform_dir(platform))
            .env("CLIENT_CODE", tenant_id)
            .timeout(self.deploy_timeout);

        command = match source {
            DeploySource::Built(artifact) => {
                command.env("ARTIFACT_PATH", artifact.path.to_string_lossy())
            }
            DeploySource::Existing { build_id, .. } => command.env("BUILD_ID", build_id.clone()),
        };

        command.run().await?;
        Ok(())
    }
}

/// Arguments to `flutter` for a release build
fn build_args(platform: Platform, tenant_id: &str) -> Vec<String> {
    let kind = match platform {
        Platform::Android => "appbundle",
        Platform::Ios => "ipa",
    };
    vec![
        "build".to_string(),
        kind.to_string(),
        "--release".to_string(),
        format!("--dart-define=CLIENT={}", tenant_id),
    ]
}

/// Fastlane lane for an upload
///
/// Fresh artifacts go through `deploy_{target}`. Builds already in the store
/// go through `submit_review` or `promote_{target}`.
fn lane_name(target: DeployTarget, source: &DeploySource) -> String {
    match source {
        DeploySource::Built(_) => format!("deploy_{}", target),
        DeploySource::Existing {
            action: ExistingBuildAction::SubmitForReview,
            ..
        } => "submit_review".to_string(),
        DeploySource::Existing {
            action: ExistingBuildAction::Promote,
            ..
        } => format!("promote_{}", target),
    }
}

fn find_with_extension(dir: &Path, extension: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::io(format!("Failed to read build output {}", dir.display()), e))?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    found.sort();

    found.into_iter().next().ok_or_else(|| Error::ExternalTool {
        command: "flutter build".to_string(),
        code: Some(0),
        stderr: format!("no .{} artifact found in {}", extension, dir.display()),
    })
}
