//! External command execution
//!
//! Every external tool (git, flutter, fastlane, pod, gcloud, keytool) runs
//! through [`CommandSpec`], which captures output, enforces a timeout and
//! classifies failures into the error taxonomy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tenantry_core::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command line with its working directory, environment and time bound
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl CommandSpec {
    /// Creates a command with a 60 second default timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Printable command line, used in errors and logs
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Runs the command to completion
    ///
    /// A non-zero exit is classified by its stderr into
    /// [`Error::TransientNetwork`] or [`Error::ExternalTool`]. Exceeding the
    /// timeout kills the child and fails with an `ExternalTool` error.
    pub async fn run(&self) -> Result<CommandOutput> {
        let shown = self.display();
        debug!("Running `{}`", shown);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let child = command
            .spawn()
            .map_err(|e| Error::io(format!("Failed to start `{}`", shown), e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| Error::io(format!("Failed to wait for `{}`", shown), e))?,
            // Dropping the future drops the child, which kills it
            Err(_) => {
                return Err(Error::ExternalTool {
                    command: shown,
                    code: None,
                    stderr: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !stderr.trim().is_empty() {
            debug!("`{}` stderr: {}", shown, stderr.trim());
        }

        if !output.status.success() {
            return Err(Error::from_tool_failure(shown, output.status.code(), stderr));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let spec = CommandSpec::new("git").args(["tag", "-l", "acme/v*"]);
        assert_eq!(spec.display(), "git tag -l acme/v*");
        assert_eq!(CommandSpec::new("flutter").display(), "flutter");
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = CommandSpec::new("sh")
            .args(["-c", "echo hello"])
            .run()
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_external_tool_error() {
        let err = CommandSpec::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run()
            .await
            .unwrap_err();
        match err {
            Error::ExternalTool { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_names_the_command() {
        let err = CommandSpec::new("sh")
            .args(["-c", "exit 2"])
            .run()
            .await
            .unwrap_err();
        match err {
            Error::ExternalTool { command, .. } => assert_eq!(command, "sh -c exit 2"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_stderr_is_transient() {
        let err = CommandSpec::new("sh")
            .args(["-c", "echo 'fatal: Could not resolve host: example.com' >&2; exit 128"])
            .run()
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_kills_the_command() {
        let err = CommandSpec::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(50))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { code: None, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let output = CommandSpec::new("sh")
            .args(["-c", "echo $CLIENT_CODE; pwd"])
            .env("CLIENT_CODE", "acme")
            .current_dir(dir.path())
            .run()
            .await
            .unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("acme"));
        assert!(lines.next().is_some());
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let err = CommandSpec::new("definitely-not-a-real-binary-xyz")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
