//! Version management
//!
//! Resolves the next app version from the manifest, rewrites the manifest's
//! version line and records the change on the deploy branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tenantry_core::domain::version::{
    AppVersion, VersionStrategy, read_manifest_version, replace_manifest_version,
};
use tenantry_core::{Error, Result};
use tracing::info;

use crate::service::tag_store::TagStore;

pub struct VersionManager {
    repo_root: PathBuf,
    manifest_path: PathBuf,
    tags: Arc<TagStore>,
}

impl VersionManager {
    /// Creates a version manager
    ///
    /// # Arguments
    /// * `repo_root` - Root of the git working tree
    /// * `manifest_path` - Path of `pubspec.yaml`
    /// * `tags` - Used to push the version commit
    pub fn new(repo_root: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>, tags: Arc<TagStore>) -> Self {
        Self {
            repo_root: repo_root.into(),
            manifest_path: manifest_path.into(),
            tags,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    fn read_manifest(&self) -> Result<String> {
        std::fs::read_to_string(&self.manifest_path).map_err(|e| {
            Error::io(format!("Failed to read {}", self.manifest_path.display()), e)
        })
    }

    /// Version currently recorded in the manifest
    pub fn current(&self) -> Result<AppVersion> {
        read_manifest_version(&self.read_manifest()?)
    }

    /// Version the strategy would produce, without writing anything
    pub fn preview(&self, strategy: VersionStrategy) -> Result<AppVersion> {
        self.current()?.resolve(strategy)
    }

    /// Rewrites the manifest with a new version
    pub fn write(&self, version: &AppVersion) -> Result<()> {
        let contents = replace_manifest_version(&self.read_manifest()?, version)?;
        std::fs::write(&self.manifest_path, contents).map_err(|e| {
            Error::io(format!("Failed to write {}", self.manifest_path.display()), e)
        })
    }

    /// Resolves, writes, commits and pushes the next version
    ///
    /// # Arguments
    /// * `tenant_id` - Tenant the version is for, used in the commit message
    /// * `branch` - Checked-out deploy branch to push
    /// * `strategy` - How to pick the version
    pub async fn apply(&self, tenant_id: &str, branch: &str, strategy: VersionStrategy) -> Result<AppVersion> {
        let current = self.current()?;
        let next = current.resolve(strategy)?;
        info!("Version {} -> {}", current, next);

        self.write(&next)?;

        let relative = self
            .manifest_path
            .strip_prefix(&self.repo_root)
            .unwrap_or(&self.manifest_path)
            .to_path_buf();
        self.tags
            .vcs()
            .commit_paths(
                &[relative],
                &format!("chore({}): bump version to {}", tenant_id, next),
            )
            .await?;
        self.tags.push_branch(branch).await?;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::testing::FakeVcs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tenantry_core::domain::version::VersionBump;

    const MANIFEST: &str = "name: loyalty\r\ndescription: White-label app\r\nversion: 1.4.2+37\r\n\r\nenvironment:\r\n  sdk: '>=3.0.0 <4.0.0'\r\n";

    fn manager(dir: &TempDir, vcs: Arc<FakeVcs>) -> VersionManager {
        let manifest = dir.path().join("app/pubspec.yaml");
        std::fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        std::fs::write(&manifest, MANIFEST).unwrap();
        let tags = TagStore::new(
            vcs,
            RetryPolicy {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        );
        VersionManager::new(dir.path(), manifest, Arc::new(tags))
    }

    #[tokio::test]
    async fn test_apply_bumps_commits_and_pushes() {
        let dir = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::new());
        let versions = manager(&dir, Arc::clone(&vcs));

        let next = versions
            .apply("acme", "deploy/acme", VersionStrategy::Bump(VersionBump::Minor))
            .await
            .unwrap();

        assert_eq!(next, AppVersion::new(1, 5, 0, 38));
        assert_eq!(versions.current().unwrap(), next);

        let contents = std::fs::read_to_string(versions.manifest_path()).unwrap();
        assert!(contents.contains("version: 1.5.0+38\r\n"));
        assert!(contents.contains("  sdk: '>=3.0.0 <4.0.0'\r\n"));

        let state = vcs.state();
        assert_eq!(state.commits, vec!["chore(acme): bump version to 1.5.0+38"]);
        assert!(state.remote_branches.contains("deploy/acme"));
    }

    #[tokio::test]
    async fn test_auto_increment_only_bumps_build() {
        let dir = TempDir::new().unwrap();
        let versions = manager(&dir, Arc::new(FakeVcs::new()));
        assert_eq!(
            versions.preview(VersionStrategy::AutoIncrement).unwrap(),
            AppVersion::new(1, 4, 2, 38)
        );
    }

    #[tokio::test]
    async fn test_explicit_version_must_raise_build() {
        let dir = TempDir::new().unwrap();
        let vcs = Arc::new(FakeVcs::new());
        let versions = manager(&dir, Arc::clone(&vcs));

        let err = versions
            .apply(
                "acme",
                "deploy/acme",
                VersionStrategy::Explicit(AppVersion::new(2, 0, 0, 37)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(versions.current().unwrap(), AppVersion::new(1, 4, 2, 37));
        assert!(vcs.state().commits.is_empty());
    }
}
