//! repo-backup - Back up every GitHub repository of a user and their organizations
//!
//! The user's repositories and the repositories of each organization are
//! listed through the GitHub REST API. Every one of them is then cloned into
//! the backup directory, or pulled if it is already there.
//!
//! ## Modules
//!
//! - [`config`]: Configuration file, defaults and target resolution
//! - [`prompt`]: Interactive prompts for missing values
//! - [`github`]: Paginated repository and organization enumeration
//! - [`git`]: Clone and pull through the git executable
//! - [`sync`]: Clone-or-pull reconciliation
//! - [`report`]: Console progress output
//! - [`backup`]: A complete backup run

pub mod backup;
pub mod config;
pub mod git;
pub mod github;
pub mod prompt;
pub mod report;
pub mod sync;

pub use backup::{run_backup, BackupOutcome};
pub use config::{BackupTarget, Config};
pub use git::{GitClient, GitOps, GitOutput};
pub use github::{ApiError, GitHubClient, RepositoryDescriptor};
pub use report::{ConsoleReporter, Reporter};
pub use sync::{SyncAction, SyncEngine, SyncResult, SyncSummary};
