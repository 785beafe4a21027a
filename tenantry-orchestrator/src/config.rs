//! Orchestrator configuration
//!
//! Defines all configurable parameters for the deployment pipeline:
//! repository layout, pool sizing, timeouts for every external tool, push
//! retry policy, and optional notification and coordination backends.

use std::path::PathBuf;
use std::time::Duration;

use tenantry_core::{Error, Result};

/// Orchestrator configuration
///
/// All timeouts are configurable so slow CI hosts and local machines can use
/// the same binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the git working tree
    pub repo_root: PathBuf,

    /// Flutter project directory (holds `pubspec.yaml`)
    pub project_dir: PathBuf,

    /// Directory with one `{tenant}.json` configuration per tenant
    pub clients_dir: PathBuf,

    /// Directory with per-tenant signing material
    pub credentials_dir: PathBuf,

    /// Branch deploy branches are cut from
    pub trunk_branch: String,

    /// Name of the git remote
    pub remote: String,

    /// Maximum number of open tenant backend handles
    pub pool_capacity: usize,

    /// Bound on constructing one backend handle
    pub pool_construct_timeout: Duration,

    /// Timeout for each git invocation
    pub git_timeout: Duration,

    /// Timeout for dependency installation (`pod install`)
    pub dependency_timeout: Duration,

    /// Timeout for a single platform build
    pub build_timeout: Duration,

    /// Timeout for a single store upload
    pub deploy_timeout: Duration,

    /// Timeout for screenshot generation
    pub screenshot_timeout: Duration,

    /// Retry policy for pushes to the remote
    pub push_retry: RetryPolicy,

    /// Coordination backend holding tenant metadata
    pub master: Option<MasterBackend>,

    /// Telegram notification target
    pub telegram: Option<TelegramTarget>,

    /// Command that generates store screenshots
    pub screenshot_command: Option<String>,
}

/// Service account and project of the coordination backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBackend {
    pub credentials: PathBuf,
    pub project_id: String,
}

/// Telegram bot and chat to notify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramTarget {
    pub bot_token: String,
    pub chat_id: String,
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl Config {
    /// Creates a new configuration with defaults for a repository root
    pub fn new(repo_root: PathBuf) -> Self {
        Self {
            project_dir: repo_root.join("app"),
            clients_dir: repo_root.join("clients"),
            credentials_dir: repo_root.join("credentials"),
            repo_root,
            trunk_branch: "main".to_string(),
            remote: "origin".to_string(),
            pool_capacity: 5,
            pool_construct_timeout: Duration::from_secs(30),
            git_timeout: Duration::from_secs(120),
            dependency_timeout: Duration::from_secs(600),
            build_timeout: Duration::from_secs(1800),
            deploy_timeout: Duration::from_secs(1800),
            screenshot_timeout: Duration::from_secs(1200),
            push_retry: RetryPolicy::default(),
            master: None,
            telegram: None,
            screenshot_command: None,
        }
    }

    /// Path of the version manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir.join("pubspec.yaml")
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - TENANTRY_REPO_ROOT (required)
    /// - TENANTRY_PROJECT_DIR, TENANTRY_CLIENTS_DIR, TENANTRY_CREDENTIALS_DIR
    ///   (optional, default: `app`, `clients`, `credentials` under the root)
    /// - TENANTRY_TRUNK_BRANCH (optional, default: main)
    /// - TENANTRY_REMOTE (optional, default: origin)
    /// - TENANTRY_POOL_CAPACITY (optional, default: 5)
    /// - TENANTRY_POOL_TIMEOUT, TENANTRY_GIT_TIMEOUT, TENANTRY_DEPENDENCY_TIMEOUT,
    ///   TENANTRY_BUILD_TIMEOUT, TENANTRY_DEPLOY_TIMEOUT (optional, seconds)
    /// - TENANTRY_PUSH_MAX_RETRIES (optional, default: 3)
    /// - TENANTRY_PUSH_BACKOFF_MS (optional, default: 500)
    /// - TENANTRY_MASTER_CREDENTIALS, TENANTRY_MASTER_PROJECT_ID (optional, together)
    /// - TENANTRY_TELEGRAM_BOT_TOKEN, TENANTRY_TELEGRAM_CHAT_ID (optional, together)
    /// - TENANTRY_SCREENSHOT_COMMAND (optional)
    pub fn from_env() -> Result<Self> {
        let repo_root = std::env::var("TENANTRY_REPO_ROOT")
            .map(PathBuf::from)
            .map_err(|_| Error::validation("TENANTRY_REPO_ROOT environment variable not set"))?;

        Self::from_env_with_root(repo_root)
    }

    /// Environment overrides on top of the defaults for a known root
    pub fn from_env_with_root(repo_root: PathBuf) -> Result<Self> {
        let mut config = Self::new(repo_root);

        if let Some(dir) = env_path("TENANTRY_PROJECT_DIR") {
            config.project_dir = dir;
        }
        if let Some(dir) = env_path("TENANTRY_CLIENTS_DIR") {
            config.clients_dir = dir;
        }
        if let Some(dir) = env_path("TENANTRY_CREDENTIALS_DIR") {
            config.credentials_dir = dir;
        }
        if let Ok(branch) = std::env::var("TENANTRY_TRUNK_BRANCH") {
            config.trunk_branch = branch;
        }
        if let Ok(remote) = std::env::var("TENANTRY_REMOTE") {
            config.remote = remote;
        }

        if let Some(capacity) = env_parse::<usize>("TENANTRY_POOL_CAPACITY") {
            config.pool_capacity = capacity;
        }
        if let Some(secs) = env_parse::<u64>("TENANTRY_POOL_TIMEOUT") {
            config.pool_construct_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TENANTRY_GIT_TIMEOUT") {
            config.git_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TENANTRY_DEPENDENCY_TIMEOUT") {
            config.dependency_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TENANTRY_BUILD_TIMEOUT") {
            config.build_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TENANTRY_DEPLOY_TIMEOUT") {
            config.deploy_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("TENANTRY_PUSH_MAX_RETRIES") {
            config.push_retry.max_attempts = retries + 1;
        }
        if let Some(ms) = env_parse::<u64>("TENANTRY_PUSH_BACKOFF_MS") {
            config.push_retry.initial_delay = Duration::from_millis(ms);
        }

        let master_credentials = env_path("TENANTRY_MASTER_CREDENTIALS");
        let master_project = std::env::var("TENANTRY_MASTER_PROJECT_ID").ok();
        config.master = match (master_credentials, master_project) {
            (Some(credentials), Some(project_id)) => Some(MasterBackend {
                credentials,
                project_id,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::validation(
                    "TENANTRY_MASTER_CREDENTIALS and TENANTRY_MASTER_PROJECT_ID must be set together",
                ));
            }
        };

        let bot_token = std::env::var("TENANTRY_TELEGRAM_BOT_TOKEN").ok();
        let chat_id = std::env::var("TENANTRY_TELEGRAM_CHAT_ID").ok();
        config.telegram = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramTarget { bot_token, chat_id }),
            (None, None) => None,
            _ => {
                return Err(Error::validation(
                    "TENANTRY_TELEGRAM_BOT_TOKEN and TENANTRY_TELEGRAM_CHAT_ID must be set together",
                ));
            }
        };

        config.screenshot_command = std::env::var("TENANTRY_SCREENSHOT_COMMAND").ok();

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.trunk_branch.trim().is_empty() {
            return Err(Error::validation("trunk_branch cannot be empty"));
        }

        if self.remote.trim().is_empty() {
            return Err(Error::validation("remote cannot be empty"));
        }

        if self.pool_capacity == 0 {
            return Err(Error::validation("pool_capacity must be greater than 0"));
        }

        let timeouts = [
            ("pool_construct_timeout", self.pool_construct_timeout),
            ("git_timeout", self.git_timeout),
            ("dependency_timeout", self.dependency_timeout),
            ("build_timeout", self.build_timeout),
            ("deploy_timeout", self.deploy_timeout),
            ("screenshot_timeout", self.screenshot_timeout),
        ];
        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(Error::validation(format!("{} must be greater than 0", name)));
            }
        }

        if self.push_retry.max_attempts == 0 {
            return Err(Error::validation("push_retry.max_attempts must be at least 1"));
        }

        if let Some(master) = &self.master
            && master.project_id.trim().is_empty()
        {
            return Err(Error::validation("master project_id cannot be empty"));
        }

        if let Some(telegram) = &self.telegram
            && (telegram.bot_token.is_empty() || telegram.chat_id.is_empty())
        {
            return Err(Error::validation(
                "telegram bot_token and chat_id cannot be empty",
            ));
        }

        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}
