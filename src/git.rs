use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Captured result of one git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Diagnostic text for a failed run, preferring stderr
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// The two git operations a backup needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Clone `url` into `path`
    async fn clone_repository(&self, url: &str, path: &Path) -> Result<GitOutput>;

    /// Pull inside an existing working tree
    async fn pull_repository(&self, path: &Path) -> Result<GitOutput>;
}

/// Runs the git executable as a subprocess with output captured
#[derive(Debug, Clone)]
pub struct GitClient {
    binary: PathBuf,
}

impl GitClient {
    /// Create a new Git client running the given executable
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str], path: &Path, cwd: Option<&Path>) -> Result<GitOutput> {
        let mut command = AsyncCommand::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0");

        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        } else {
            command.arg(path);
        }

        debug!("Running {:?} {:?} for {}", self.binary, args, path.display());

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl GitOps for GitClient {
    async fn clone_repository(&self, url: &str, path: &Path) -> Result<GitOutput> {
        self.run(&["clone", url], path, None).await
    }

    async fn pull_repository(&self, path: &Path) -> Result<GitOutput> {
        self.run(&["pull"], path, Some(path)).await
    }
}
