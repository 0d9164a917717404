//! Console progress reporting
//!
//! Reporters only observe a run; nothing they do feeds back into control flow.

use crate::sync::{SyncAction, SyncResult};
use path_clean::PathClean;
use reqwest::StatusCode;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Receives progress events from a backup run
pub trait Reporter {
    /// The backup directory exists and will receive the clones
    fn backup_directory(&mut self, path: &Path);

    /// The user repository listing failed with a non-success status
    fn api_error(&mut self, status: StatusCode, body: &str);

    /// Organization discovery stopped early
    fn organization_warning(&mut self, error: &anyhow::Error);

    /// Enumeration finished with `total` repositories
    fn enumerated(&mut self, total: usize);

    /// About to clone or pull the `index`-th of `total` repositories (1-based)
    fn item_started(&mut self, index: usize, total: usize, name: &str, action: SyncAction);

    fn item_finished(&mut self, result: &SyncResult);

    /// The run reached the end, whatever the per-item outcome
    fn complete(&mut self, path: &Path);
}

/// Human-readable status lines, written to stdout by default
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // A closed stdout must not abort a backup, so write errors are dropped.
    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(text);
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

/// Absolute form of `path`, normalized lexically against the current directory
pub fn display_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path).clean())
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn backup_directory(&mut self, path: &Path) {
        self.line(format_args!("Backing up to: {}", display_path(path).display()));
    }

    fn api_error(&mut self, status: StatusCode, body: &str) {
        self.line(format_args!("Error accessing GitHub API: {}", status.as_u16()));
        self.line(format_args!("{}", body));
    }

    fn organization_warning(&mut self, error: &anyhow::Error) {
        self.line(format_args!(
            "Warning: Could not fetch organization repositories: {:#}",
            error
        ));
    }

    fn enumerated(&mut self, total: usize) {
        self.line(format_args!("Found {} repositories to back up", total));
    }

    fn item_started(&mut self, index: usize, total: usize, name: &str, action: SyncAction) {
        self.line(format_args!("[{}/{}] Processing {}...", index, total, name));
        match action {
            SyncAction::Clone => self.line(format_args!("Cloning {}...", name)),
            SyncAction::Pull => self.line(format_args!("Updating {}...", name)),
        }
    }

    fn item_finished(&mut self, result: &SyncResult) {
        match result {
            SyncResult::Cloned { name, .. } => self.line(format_args!("✓ Cloned {}", name)),
            SyncResult::Pulled { name, .. } => self.line(format_args!("✓ Updated {}", name)),
            SyncResult::Failed {
                name,
                action: SyncAction::Clone,
                ..
            } => self.line(format_args!("✗ Failed to clone {}", name)),
            SyncResult::Failed {
                name,
                action: SyncAction::Pull,
                ..
            } => self.line(format_args!("✗ Failed to update {}", name)),
        }
    }

    fn complete(&mut self, path: &Path) {
        self.line(format_args!(
            "\nBackup complete! All repositories saved to {}",
            display_path(path).display()
        ));
    }
}
