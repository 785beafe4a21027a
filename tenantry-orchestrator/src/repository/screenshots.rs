//! Store screenshot generation
//!
//! Screenshots are captured into `screenshots/{tenant}/{platform}` under the
//! repository root. Store-ready captures are named `01_*.png`, `02_*.png`,
//! and so on; only files matching `0*.png` count.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenantry_core::domain::pipeline::Platform;
use tenantry_core::{Error, Result};
use tracing::{debug, info};

use crate::process::CommandSpec;

/// Repository trait for screenshot capture
#[async_trait]
pub trait ScreenshotGenerator: Send + Sync {
    /// Captures screenshots of the tenant's app into `output_dir`
    async fn generate(&self, tenant_id: &str, platform: Platform, output_dir: &Path) -> Result<()>;
}

/// Runs a configured shell command to capture screenshots
///
/// The command sees `CLIENT_CODE`, `PLATFORM` and `SCREENSHOTS_DIR` in its
/// environment.
pub struct ScriptScreenshotGenerator {
    command: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScriptScreenshotGenerator {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ScreenshotGenerator for ScriptScreenshotGenerator {
    async fn generate(&self, tenant_id: &str, platform: Platform, output_dir: &Path) -> Result<()> {
        info!("Capturing {} screenshots for {}", platform, tenant_id);
        CommandSpec::new("sh")
            .args(["-c", self.command.as_str()])
            .current_dir(&self.working_dir)
            .env("CLIENT_CODE", tenant_id)
            .env("PLATFORM", platform.as_str())
            .env("SCREENSHOTS_DIR", output_dir.to_string_lossy())
            .timeout(self.timeout)
            .run()
            .await?;
        Ok(())
    }
}

/// Directory holding a tenant's screenshots for one platform
pub fn screenshots_dir(repo_root: &Path, tenant_id: &str, platform: Platform) -> PathBuf {
    repo_root
        .join("screenshots")
        .join(tenant_id)
        .join(platform.as_str())
}

fn is_store_screenshot(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with('0') && name.ends_with(".png")
}

/// Store screenshots currently in a directory, sorted by name
pub fn list_screenshots(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::io(format!("Failed to read {}", dir.display()), e))?;
    let mut screenshots: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_store_screenshot(path))
        .collect();
    screenshots.sort();
    Ok(screenshots)
}

/// Removes stale captures so a fresh run starts from an empty set
pub fn clear_screenshots(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("Failed to create {}", dir.display()), e))?;

    let stale = list_screenshots(dir)?;
    for path in &stale {
        std::fs::remove_file(path)
            .map_err(|e| Error::io(format!("Failed to remove {}", path.display()), e))?;
    }
    if !stale.is_empty() {
        debug!("Removed {} old screenshot(s) from {}", stale.len(), dir.display());
    }
    Ok(stale.len())
}

/// Fails unless at least one store screenshot exists
///
/// # Returns
/// Number of screenshots found
pub fn validate_screenshots(dir: &Path) -> Result<usize> {
    let count = list_screenshots(dir)?.len();
    if count == 0 {
        return Err(Error::validation(format!(
            "No screenshots found in {}",
            dir.display()
        )));
    }
    Ok(count)
}
