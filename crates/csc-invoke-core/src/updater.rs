//! Pre-compile API updater hook.
//!
//! Before the compiler starts, an updater is given the response-file path so
//! it can rewrite obsolete API usages in the listed sources. What happens when
//! it fails is decided by [`UpdaterFailurePolicy`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{InvokeError, Result};

/// What the updater did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterOutcome {
    Applied,
    Skipped,
}

/// Behaviour when the updater reports failure.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterFailurePolicy {
    /// Propagate the failure; the compiler is not started.
    #[default]
    Abort,
    /// Log the failure and compile anyway.
    Continue,
}

/// Collaborator invoked with the response file before compilation.
#[async_trait]
pub trait ApiUpdater: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn update(&self, response_file: &Path) -> Result<UpdaterOutcome>;
}

/// Updater that does nothing and says so.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipUpdater;

#[async_trait]
impl ApiUpdater for SkipUpdater {
    fn name(&self) -> &str {
        "skip"
    }

    async fn update(&self, _response_file: &Path) -> Result<UpdaterOutcome> {
        Ok(UpdaterOutcome::Skipped)
    }
}

/// Runs an external program with the response-file path as its last argument.
#[derive(Debug, Clone)]
pub struct CommandUpdater {
    command: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandUpdater {
    /// `command[0]` is the executable, the rest are leading arguments.
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(InvokeError::Config(
                "updater command must not be empty".to_string(),
            ));
        }
        Ok(Self {
            command,
            working_dir: None,
        })
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl ApiUpdater for CommandUpdater {
    fn name(&self) -> &str {
        &self.command[0]
    }

    async fn update(&self, response_file: &Path) -> Result<UpdaterOutcome> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg(response_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| InvokeError::UpdaterFailed(format!("failed to run {}: {e}", self.name())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InvokeError::UpdaterFailed(format!(
                "{} exited with code {}: {}",
                self.name(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(UpdaterOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skip_updater() {
        let outcome = SkipUpdater.update(Path::new("any.rsp")).await.unwrap();
        assert_eq!(outcome, UpdaterOutcome::Skipped);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandUpdater::new(vec![]).unwrap_err(),
            InvokeError::Config(_)
        ));
    }

    #[test]
    fn test_default_policy_aborts() {
        assert_eq!(UpdaterFailurePolicy::default(), UpdaterFailurePolicy::Abort);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_updater_receives_path() {
        let dir = tempfile::tempdir().unwrap();
        let rsp = dir.path().join("args.rsp");
        std::fs::write(&rsp, "/target:library\n").unwrap();

        let updater = CommandUpdater::new(vec!["test".to_string(), "-f".to_string()]).unwrap();
        assert_eq!(updater.update(&rsp).await.unwrap(), UpdaterOutcome::Applied);

        let missing = dir.path().join("missing.rsp");
        let err = updater.update(&missing).await.unwrap_err();
        assert!(matches!(err, InvokeError::UpdaterFailed(_)));
    }

    #[tokio::test]
    async fn test_command_updater_missing_program() {
        let updater =
            CommandUpdater::new(vec!["definitely-not-an-updater-binary".to_string()]).unwrap();
        let err = updater.update(Path::new("x.rsp")).await.unwrap_err();
        assert!(err.to_string().contains("failed to run"));
    }
}
