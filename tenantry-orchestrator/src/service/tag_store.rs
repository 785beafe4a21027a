//! Tag store
//!
//! Thin layer over version control for immutable release markers and the
//! branches they live on. Pushes retry transient network failures with
//! bounded backoff; everything else surfaces immediately.

use std::sync::Arc;
use tenantry_core::{Conflict, Result};
use tracing::info;

use crate::config::RetryPolicy;
use crate::repository::VersionControl;
use crate::retry::retry_transient;

pub struct TagStore {
    vcs: Arc<dyn VersionControl>,
    push_retry: RetryPolicy,
}

impl TagStore {
    pub fn new(vcs: Arc<dyn VersionControl>, push_retry: RetryPolicy) -> Self {
        Self { vcs, push_retry }
    }

    pub fn vcs(&self) -> &dyn VersionControl {
        self.vcs.as_ref()
    }

    /// Creates an annotated tag at HEAD, refusing to reuse a name
    pub async fn create(&self, name: &str, message: &str) -> Result<()> {
        if self.vcs.tag_exists(name).await? {
            return Err(Conflict::TagExists(name.to_string()).into());
        }
        self.vcs.create_tag(name, message).await?;
        info!("Created tag {}", name);
        Ok(())
    }

    /// Pushes a tag, retrying transient failures
    pub async fn push(&self, name: &str) -> Result<()> {
        let vcs = self.vcs.as_ref();
        retry_transient(&self.push_retry, &format!("Push of tag {}", name), move || {
            vcs.push_tag(name)
        })
        .await?;
        info!("Pushed tag {}", name);
        Ok(())
    }

    /// Creates a tag and pushes it
    ///
    /// A tag that was created but could not be pushed is reported as
    /// [`Conflict::UnpushedTag`] so the operator can push or delete it.
    pub async fn publish(&self, name: &str, message: &str) -> Result<()> {
        self.create(name, message).await?;
        self.push(name).await.map_err(|e| {
            Conflict::UnpushedTag {
                tag: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Pushes a branch, retrying transient failures
    pub async fn push_branch(&self, branch: &str) -> Result<()> {
        let vcs = self.vcs.as_ref();
        retry_transient(&self.push_retry, &format!("Push of branch {}", branch), move || {
            vcs.push_branch(branch)
        })
        .await
    }

    /// Tags matching a glob pattern, oldest first
    pub async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        self.vcs.list_tags(pattern).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.vcs.tag_exists(name).await
    }

    /// Checks out a tag with a detached HEAD
    pub async fn checkout(&self, name: &str) -> Result<()> {
        self.vcs.checkout_detached(name).await
    }
}
