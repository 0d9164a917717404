//! Sync Engine - clone-or-pull reconciliation of enumerated repositories
//!
//! Each repository maps to `<backup_dir>/<name>`. An existing path is pulled,
//! a missing one is cloned. Repositories are processed one at a time, in
//! order, and a failure on one never stops the batch.

use crate::git::{GitClient, GitOps};
use crate::github::RepositoryDescriptor;
use crate::report::Reporter;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What the engine does with one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Path missing: `git clone <url> <path>`
    Clone,
    /// Path present: `git pull` inside it
    Pull,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Clone => write!(f, "clone"),
            SyncAction::Pull => write!(f, "pull"),
        }
    }
}

/// Result of a sync operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Repository was successfully cloned
    Cloned { name: String, path: PathBuf },
    /// Repository was successfully pulled
    Pulled { name: String, path: PathBuf },
    /// Clone or pull failed; `diagnostics` holds the captured git output
    Failed {
        name: String,
        path: PathBuf,
        action: SyncAction,
        diagnostics: String,
    },
}

impl SyncResult {
    pub fn name(&self) -> &str {
        match self {
            SyncResult::Cloned { name, .. }
            | SyncResult::Pulled { name, .. }
            | SyncResult::Failed { name, .. } => name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SyncResult::Cloned { path, .. }
            | SyncResult::Pulled { path, .. }
            | SyncResult::Failed { path, .. } => path,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, SyncResult::Failed { .. })
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub pulled: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    /// Compile sync summary from results
    pub fn from_results(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut cloned = 0;
        let mut pulled = 0;
        let mut failed = 0;

        for result in &results {
            match result {
                SyncResult::Cloned { .. } => cloned += 1,
                SyncResult::Pulled { .. } => pulled += 1,
                SyncResult::Failed { .. } => failed += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            cloned,
            pulled,
            failed,
            duration,
            results,
        }
    }
}

/// Reconciles repositories against a backup directory
pub struct SyncEngine<G: GitOps = GitClient> {
    backup_dir: PathBuf,
    git: G,
}

impl<G: GitOps> SyncEngine<G> {
    /// Create a new sync engine writing under `backup_dir`
    pub fn new(backup_dir: impl Into<PathBuf>, git: G) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            git,
        }
    }

    /// Local path and action for a repository, decided by path existence alone
    pub fn plan(&self, repo: &RepositoryDescriptor) -> (PathBuf, SyncAction) {
        let path = self.backup_dir.join(&repo.name);
        let action = if path.exists() {
            SyncAction::Pull
        } else {
            SyncAction::Clone
        };
        (path, action)
    }

    /// Clone or pull one repository. Failures are returned as [`SyncResult::Failed`].
    pub async fn sync_repository(&self, repo: &RepositoryDescriptor) -> SyncResult {
        let (path, action) = self.plan(repo);
        self.apply(repo, path, action).await
    }

    async fn apply(
        &self,
        repo: &RepositoryDescriptor,
        path: PathBuf,
        action: SyncAction,
    ) -> SyncResult {
        let output = match action {
            SyncAction::Clone => self.git.clone_repository(&repo.clone_url, &path).await,
            SyncAction::Pull => self.git.pull_repository(&path).await,
        };

        let name = repo.name.clone();
        match output {
            Ok(output) if output.success => {
                debug!("git {} succeeded for {}", action, path.display());
                match action {
                    SyncAction::Clone => SyncResult::Cloned { name, path },
                    SyncAction::Pull => SyncResult::Pulled { name, path },
                }
            }
            Ok(output) => {
                let diagnostics = output.diagnostics();
                debug!("git {} failed for {}: {}", action, path.display(), diagnostics);
                SyncResult::Failed {
                    name,
                    path,
                    action,
                    diagnostics,
                }
            }
            Err(e) => {
                info!("Could not run git {} for {}: {:#}", action, path.display(), e);
                SyncResult::Failed {
                    name,
                    path,
                    action,
                    diagnostics: format!("{:#}", e),
                }
            }
        }
    }

    /// Sync every repository in order, reporting progress as it goes
    pub async fn sync_repos(
        &self,
        repos: &[RepositoryDescriptor],
        reporter: &mut dyn Reporter,
    ) -> SyncSummary {
        let start_time = Instant::now();
        let total = repos.len();
        let mut results = Vec::with_capacity(total);

        for (index, repo) in repos.iter().enumerate() {
            let (path, action) = self.plan(repo);
            reporter.item_started(index + 1, total, &repo.name, action);

            let result = self.apply(repo, path, action).await;
            reporter.item_finished(&result);
            results.push(result);
        }

        let summary = SyncSummary::from_results(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} cloned, {} pulled, {} failed",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.pulled,
            summary.failed
        );

        summary
    }
}
