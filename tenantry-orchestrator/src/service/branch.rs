//! Branch lifecycle
//!
//! Every tenant deploys from its own long-lived branch, `deploy/{tenant}`,
//! cut from trunk the first time and reused afterwards. Releases are marked
//! with immutable tags on that branch; rollbacks check out an older tag and
//! leave a timestamped marker tag behind.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tenantry_core::domain::release::{
    ReleaseTag, deploy_branch_name, release_tag_pattern, rollback_tag_name,
};
use tenantry_core::domain::tenant::validate_tenant_id;
use tenantry_core::{Conflict, Error, Result};
use tracing::{debug, info, warn};

use crate::service::tag_store::TagStore;

pub struct BranchLifecycle {
    tags: Arc<TagStore>,
    trunk: String,
}

impl BranchLifecycle {
    pub fn new(tags: Arc<TagStore>, trunk: impl Into<String>) -> Self {
        Self {
            tags,
            trunk: trunk.into(),
        }
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    /// Fails with the offending paths unless the working tree is clean
    ///
    /// Changes are never stashed or discarded on the operator's behalf.
    pub async fn ensure_clean(&self) -> Result<()> {
        let changes = self.tags.vcs().status().await?;
        if changes.is_empty() {
            return Ok(());
        }

        Err(Conflict::DirtyWorkingTree {
            paths: changes.into_iter().map(|c| c.path).collect(),
        }
        .into())
    }

    /// Checks out the tenant's deploy branch, creating it from trunk if needed
    ///
    /// An existing branch is fast-forwarded from the remote; a branch that
    /// was never pushed is used as is. Calling this repeatedly leaves the
    /// repository in the same state.
    ///
    /// # Returns
    /// The branch name
    pub async fn ensure_deploy_branch(&self, tenant_id: &str) -> Result<String> {
        validate_tenant_id(tenant_id)?;
        self.ensure_clean().await?;

        let vcs = self.tags.vcs();
        let branch = deploy_branch_name(tenant_id);

        if vcs.branch_exists(&branch).await? {
            if vcs.current_branch().await?.as_deref() != Some(branch.as_str()) {
                vcs.checkout(&branch).await?;
            }
            match vcs.pull(&branch).await {
                Ok(()) => debug!("Fast-forwarded {}", branch),
                Err(e) if e.is_missing_remote_ref() => {
                    debug!("{} has no remote counterpart yet", branch)
                }
                Err(e) => return Err(e),
            }
            info!("Using existing deploy branch {}", branch);
        } else {
            if vcs.current_branch().await?.as_deref() != Some(self.trunk.as_str()) {
                vcs.checkout(&self.trunk).await?;
            }
            vcs.pull(&self.trunk).await?;
            vcs.create_branch(&branch, &self.trunk).await?;
            info!("Created deploy branch {} from {}", branch, self.trunk);
        }

        Ok(branch)
    }

    /// Creates and pushes the release tag `{tenant}/v{version}+{build}`
    ///
    /// # Returns
    /// The tag name
    pub async fn tag_release(&self, tenant_id: &str, version: &str, build_number: u32) -> Result<String> {
        let tag = ReleaseTag::new(tenant_id, version, build_number);
        let name = tag.to_string();
        if ReleaseTag::parse(&name).as_ref() != Some(&tag) {
            return Err(Error::validation(format!("'{}' is not a valid release tag", name)));
        }

        self.tags.publish(&name, &tag.message()).await?;
        Ok(name)
    }

    /// Tags matching `{tenant}/v*`, oldest first by creation
    pub async fn list_release_tags(&self, tenant_id: &str) -> Result<Vec<String>> {
        validate_tenant_id(tenant_id)?;
        self.tags.list(&release_tag_pattern(tenant_id)).await
    }

    /// Release tags of a tenant that parse, rollback markers excluded
    pub async fn list_releases(&self, tenant_id: &str) -> Result<Vec<ReleaseTag>> {
        Ok(self
            .list_release_tags(tenant_id)
            .await?
            .iter()
            .filter_map(|name| ReleaseTag::parse(name))
            .filter(|tag| tag.client_name == tenant_id)
            .collect())
    }

    /// Checks out a release tag with a detached HEAD
    pub async fn rollback_to(&self, tag: &str) -> Result<()> {
        self.ensure_clean().await?;
        if !self.tags.exists(tag).await? {
            return Err(Error::validation(format!("Tag '{}' does not exist", tag)));
        }

        self.tags.checkout(tag).await?;
        info!("Checked out {} (detached)", tag);
        Ok(())
    }

    /// Creates and pushes the audit marker for a rollback to `tag`
    ///
    /// # Returns
    /// The marker tag name
    pub async fn mark_rollback(&self, tag: &str, at: DateTime<Utc>) -> Result<String> {
        let marker = rollback_tag_name(tag, at);
        self.tags
            .publish(&marker, &format!("Rollback to {}", tag))
            .await?;
        Ok(marker)
    }

    /// Returns from a detached HEAD to the tenant's deploy branch
    pub async fn return_to_branch(&self, tenant_id: &str) -> Result<()> {
        let branch = deploy_branch_name(tenant_id);
        if let Err(e) = self.tags.vcs().checkout(&branch).await {
            warn!("Could not return to {}: {}", branch, e);
            return Err(e);
        }
        Ok(())
    }
}
