//! Version control repository
//!
//! Wraps the `git` command line for the operations the deployment flow needs:
//! - Working tree status
//! - Branch checkout, creation, fast-forward pulls and pushes
//! - Annotated tags, listed in creation order

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenantry_core::{Error, Result};
use tracing::debug;

use crate::process::{CommandOutput, CommandSpec};

/// Kind of change reported for a path in the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
    Conflicted,
    Other,
}

/// One uncommitted change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub kind: ChangeKind,
    pub path: String,
}

/// Repository trait for version-control operations
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Lists uncommitted changes, untracked files included
    async fn status(&self) -> Result<Vec<ChangedPath>>;

    /// Name of the checked-out branch, `None` when HEAD is detached
    async fn current_branch(&self) -> Result<Option<String>>;

    /// Whether a local branch exists
    async fn branch_exists(&self, branch: &str) -> Result<bool>;

    /// Checks out an existing local branch
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Checks out a tag or commit with a detached HEAD
    async fn checkout_detached(&self, reference: &str) -> Result<()>;

    /// Creates a branch at `start_point` and checks it out
    async fn create_branch(&self, branch: &str, start_point: &str) -> Result<()>;

    /// Fast-forwards a branch from the remote
    async fn pull(&self, branch: &str) -> Result<()>;

    /// Pushes a branch to the remote
    async fn push_branch(&self, branch: &str) -> Result<()>;

    /// Commits the given paths with a message
    async fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<()>;

    /// Creates an annotated tag at HEAD
    async fn create_tag(&self, name: &str, message: &str) -> Result<()>;

    /// Pushes a single tag to the remote
    async fn push_tag(&self, name: &str) -> Result<()>;

    /// Tags matching a glob pattern, oldest first by creation date
    async fn list_tags(&self, pattern: &str) -> Result<Vec<String>>;

    /// Whether a local tag exists
    async fn tag_exists(&self, name: &str) -> Result<bool>;
}

/// `git` subprocess implementation of VersionControl
pub struct GitCli {
    repo_root: PathBuf,
    remote: String,
    timeout: Duration,
}

impl GitCli {
    /// Creates a git repository wrapper
    ///
    /// # Arguments
    /// * `repo_root` - Working tree to operate on
    /// * `remote` - Remote used for pulls and pushes (e.g. "origin")
    /// * `timeout` - Bound on every git invocation
    pub fn new(repo_root: impl Into<PathBuf>, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            remote: remote.into(),
            timeout,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout)
    }

    async fn run<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.git(args).run().await
    }

    /// Runs a query whose exit code 1 means "no"
    async fn probe<I, S>(&self, args: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.run(args).await {
            Ok(_) => Ok(true),
            Err(Error::ExternalTool { code: Some(1), .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn status(&self) -> Result<Vec<ChangedPath>> {
        let output = self
            .run(["status", "--porcelain=v1", "--untracked-files=all"])
            .await?;
        Ok(parse_porcelain(&output.stdout))
    }

    async fn current_branch(&self) -> Result<Option<String>> {
        match self.run(["symbolic-ref", "--quiet", "--short", "HEAD"]).await {
            Ok(output) => Ok(Some(output.stdout.trim().to_string())),
            Err(Error::ExternalTool { code: Some(1), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        self.probe([
            "rev-parse".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
            format!("refs/heads/{}", branch),
        ])
        .await
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        debug!("Checking out {}", branch);
        self.run(["checkout", branch]).await?;
        Ok(())
    }

    async fn checkout_detached(&self, reference: &str) -> Result<()> {
        debug!("Checking out {} (detached)", reference);
        self.run(["checkout", "--detach", reference]).await?;
        Ok(())
    }

    async fn create_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        debug!("Creating branch {} from {}", branch, start_point);
        self.run(["checkout", "-b", branch, start_point]).await?;
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<()> {
        self.run(["pull", "--ff-only", self.remote.as_str(), branch])
            .await?;
        Ok(())
    }

    async fn push_branch(&self, branch: &str) -> Result<()> {
        self.run(["push", "-u", self.remote.as_str(), branch]).await?;
        Ok(())
    }

    async fn commit_paths(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let paths: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut add = vec!["add".to_string(), "--".to_string()];
        add.extend(paths.iter().cloned());
        self.run(add).await?;

        let mut commit = vec![
            "commit".to_string(),
            "-m".to_string(),
            message.to_string(),
            "--".to_string(),
        ];
        commit.extend(paths);
        self.run(commit).await?;
        Ok(())
    }

    async fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        self.run(["tag", "-a", name, "-m", message]).await?;
        Ok(())
    }

    async fn push_tag(&self, name: &str) -> Result<()> {
        self.run([
            "push".to_string(),
            self.remote.clone(),
            format!("refs/tags/{}", name),
        ])
        .await?;
        Ok(())
    }

    async fn list_tags(&self, pattern: &str) -> Result<Vec<String>> {
        let output = self
            .run(["tag", "--list", pattern, "--sort=creatordate"])
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn tag_exists(&self, name: &str) -> Result<bool> {
        self.probe([
            "rev-parse".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
            format!("refs/tags/{}", name),
        ])
        .await
    }
}

/// Parses `git status --porcelain=v1` output
pub fn parse_porcelain(output: &str) -> Vec<ChangedPath> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let code = &line[..2];
            let rest = &line[3..];
            // Renames report "old -> new"; the new path is the one on disk
            let path = rest.rsplit_once(" -> ").map_or(rest, |(_, new)| new);

            ChangedPath {
                kind: change_kind(code),
                path: unquote(path),
            }
        })
        .collect()
}

fn change_kind(code: &str) -> ChangeKind {
    let mut chars = code.chars();
    let index = chars.next().unwrap_or(' ');
    let worktree = chars.next().unwrap_or(' ');

    match (index, worktree) {
        ('?', '?') => ChangeKind::Untracked,
        ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => ChangeKind::Conflicted,
        ('R', _) | (_, 'R') => ChangeKind::Renamed,
        ('A', _) => ChangeKind::Added,
        ('D', _) | (_, 'D') => ChangeKind::Deleted,
        ('M', _) | (_, 'M') | ('T', _) | (_, 'T') => ChangeKind::Modified,
        _ => ChangeKind::Other,
    }
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .map(|p| p.replace("\\\"", "\"").replace("\\\\", "\\"))
        .unwrap_or_else(|| path.to_string())
}
