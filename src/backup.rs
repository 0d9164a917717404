//! One backup run: enumerate, then reconcile every repository on disk

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::info;

use crate::config::{BackupTarget, Config};
use crate::git::GitOps;
use crate::github::{ApiError, GitHubClient};
use crate::report::Reporter;
use crate::sync::{SyncEngine, SyncSummary};

/// How a run ended
#[derive(Debug)]
pub enum BackupOutcome {
    /// Every repository was attempted; individual items may still have failed
    Completed(SyncSummary),
    /// The user repository listing was refused, nothing was synced
    Aborted { status: StatusCode },
}

/// Back up every repository of `target` using `git`, reporting to `reporter`
pub async fn run_backup<G: GitOps>(
    config: &Config,
    target: &BackupTarget,
    git: G,
    reporter: &mut dyn Reporter,
) -> Result<BackupOutcome> {
    tokio::fs::create_dir_all(&target.backup_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create backup directory: {}",
                target.backup_dir.display()
            )
        })?;
    reporter.backup_directory(&target.backup_dir);

    let client = GitHubClient::from_target(config, target)?;
    info!(
        "Enumerating repositories for {} ({})",
        client.username(),
        if client.is_authenticated() {
            "authenticated"
        } else {
            "anonymous"
        }
    );

    let enumeration = match client.enumerate(config.github.include_organizations).await {
        Ok(enumeration) => enumeration,
        Err(e) => {
            return match e.downcast_ref::<ApiError>() {
                Some(ApiError::Status { status, body, .. }) => {
                    reporter.api_error(*status, body);
                    Ok(BackupOutcome::Aborted { status: *status })
                }
                None => Err(e),
            };
        }
    };

    if let Some(e) = &enumeration.organization_error {
        reporter.organization_warning(e);
    }
    reporter.enumerated(enumeration.repositories.len());

    let engine = SyncEngine::new(target.backup_dir.clone(), git);
    let summary = engine.sync_repos(&enumeration.repositories, reporter).await;

    reporter.complete(&target.backup_dir);
    Ok(BackupOutcome::Completed(summary))
}
