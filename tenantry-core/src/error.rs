//! Error types for Tenantry
//!
//! Every failure is classified into one of a small set of kinds so that
//! callers can decide whether to retry, how to report it, and what the
//! operator should do about it.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Tenantry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stderr fragments that mark a failure as a network hiccup worth retrying
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "operation timed out",
    "timed out",
    "could not resolve host",
    "temporary failure in name resolution",
    "name or service not known",
    "network is unreachable",
    "the remote end hung up unexpectedly",
    "early eof",
    "tls handshake timeout",
];

/// Stderr fragments git prints when a branch has no remote counterpart yet
const MISSING_REMOTE_REF_PATTERNS: &[&str] = &[
    "couldn't find remote ref",
    "no such ref was fetched",
    "there is no tracking information",
];

/// Errors that can occur anywhere in the deployment system
///
/// The type is `Clone` so a single failure can be handed to every caller
/// waiting on the same pool construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Bad or missing input; never retried
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A bounded wait on a pooled resource expired
    #[error("Timed out after {timeout:?} waiting for {resource}")]
    ResourceTimeout {
        /// Resource that was being constructed
        resource: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// A subprocess exited unsuccessfully
    #[error("`{command}` failed ({}): {stderr}", describe_code(.code))]
    ExternalTool {
        /// Command line that was run
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Network failure eligible for bounded retry
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    /// The repository or credential state does not allow the operation
    #[error("{0}")]
    StateConflict(Conflict),

    /// A remote API rejected the request
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// State conflicts that the operator has to resolve by hand
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    /// Uncommitted changes in the working tree
    #[error("Working tree has {}", describe_paths(.paths))]
    DirtyWorkingTree {
        /// Offending paths as reported by the version-control status
        paths: Vec<String>,
    },

    /// A tag with this name already exists
    #[error("Tag '{0}' already exists")]
    TagExists(String),

    /// A tag was created locally but could not be pushed
    #[error("Tag '{tag}' was created locally but could not be pushed: {reason}")]
    UnpushedTag {
        /// Name of the local tag
        tag: String,
        /// Why the push failed
        reason: String,
    },

    /// Signing material already exists and regeneration was not confirmed
    #[error("Keystore already exists at {0}")]
    KeystoreExists(String),
}

impl Conflict {
    /// Commands or steps the operator can take to resolve the conflict
    pub fn remediation(&self) -> String {
        match self {
            Conflict::DirtyWorkingTree { paths } => {
                let mut text = String::from(
                    "Commit, stash, or discard these changes before deploying:\n",
                );
                text.push_str("  git status\n");
                text.push_str("  git add -A && git commit -m \"<message>\"   # keep the changes\n");
                text.push_str("  git stash push -u                          # set them aside\n");
                for path in paths {
                    text.push_str(&format!("  git checkout -- {}\n", path));
                }
                text
            }
            Conflict::TagExists(tag) => format!(
                "Pick a higher build number, or delete the tag if it was created by mistake:\n  git tag -d {tag}\n  git push origin :refs/tags/{tag}\n"
            ),
            Conflict::UnpushedTag { tag, .. } => format!(
                "Push the tag once the remote is reachable, or remove it locally:\n  git push origin {tag}\n  git tag -d {tag}\n"
            ),
            Conflict::KeystoreExists(path) => format!(
                "Existing keystores are never overwritten. Re-run with explicit confirmation to archive {path} and generate a new one.\n"
            ),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

fn describe_paths(paths: &[String]) -> String {
    format!("{} uncommitted change(s): {}", paths.len(), paths.join(", "))
}

impl Error {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an I/O error with context about what was being done
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Io(format!("{}: {}", context, err))
    }

    /// Classifies a failed subprocess by its stderr
    ///
    /// Network-looking failures become [`Error::TransientNetwork`], everything
    /// else is an [`Error::ExternalTool`].
    pub fn from_tool_failure(
        command: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let stderr = stderr.into();

        if is_transient_message(&stderr) {
            Self::TransientNetwork(format!("`{}`: {}", command, stderr.trim()))
        } else {
            Self::ExternalTool {
                command,
                code,
                stderr: stderr.trim().to_string(),
            }
        }
    }

    /// Whether this error may succeed if retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Whether git failed because the remote branch does not exist yet
    pub fn is_missing_remote_ref(&self) -> bool {
        match self {
            Self::ExternalTool { stderr, .. } => {
                let lower = stderr.to_lowercase();
                MISSING_REMOTE_REF_PATTERNS.iter().any(|p| lower.contains(p))
            }
            _ => false,
        }
    }

    /// The structured conflict, if this is a state conflict
    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            Self::StateConflict(conflict) => Some(conflict),
            _ => None,
        }
    }

    /// Short name of the error kind, used in notifications and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::ResourceTimeout { .. } => "ResourceTimeoutError",
            Self::ExternalTool { .. } => "ExternalToolError",
            Self::TransientNetwork(_) => "TransientNetworkError",
            Self::StateConflict(_) => "StateConflictError",
            Self::Backend(_) => "BackendError",
            Self::Io(_) => "IoError",
        }
    }
}

impl From<Conflict> for Error {
    fn from(conflict: Conflict) -> Self {
        Self::StateConflict(conflict)
    }
}

/// Whether a message matches one of the transient network patterns
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}
