use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Directory used when neither a flag, the config file, nor the prompt names one
pub const DEFAULT_BACKUP_DIRECTORY: &str = "./github_repos";

/// Main configuration structure for repo-backup
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Root directory that receives one subdirectory per repository
    #[serde(default)]
    pub backup_directory: Option<String>,

    /// GitHub account and API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// GitHub username whose repositories are backed up
    pub username: Option<String>,

    /// Access token; the GITHUB_TOKEN environment variable takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Base URL of the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Page size for every paginated request
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Include organization repositories
    #[serde(default = "default_true")]
    pub include_organizations: bool,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Name or path of the git executable
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "warn"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact" or "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_per_page() -> u8 {
    100
}
fn default_true() -> bool {
    true
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            api_url: default_api_url(),
            per_page: default_per_page(),
            include_organizations: default_true(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_unexpanded(path)?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Load configuration as written, leaving `~` and `$VAR` in paths untouched
    pub fn load_unexpanded(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save configuration to a file, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repo-backup").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        if let Some(dir) = &self.backup_directory {
            self.backup_directory = Some(expand_path(dir)?.to_string_lossy().into_owned());
        }

        Ok(())
    }

    /// Token from the environment, ignoring empty values
    pub fn token_from_env() -> Option<String> {
        env::var("GITHUB_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

/// Expand `~` and `$VAR` references in a user-supplied path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path: {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Values supplied on the command line, each taking precedence over config and env
#[derive(Debug, Clone, Default)]
pub struct TargetOverrides {
    pub username: Option<String>,
    pub token: Option<String>,
    pub directory: Option<String>,
}

/// Everything a backup run needs to know about whose repositories go where.
///
/// This is the pure input of the enumerator and sync engine; how it was
/// gathered (flags, config file, prompts) does not matter past this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    pub username: String,
    pub token: Option<String>,
    pub backup_dir: PathBuf,
}

/// Partially resolved target: whatever flags, env and config provided
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialTarget {
    pub username: Option<String>,
    pub token: Option<String>,
    pub directory: Option<String>,
}

impl PartialTarget {
    /// Merge CLI overrides, the GITHUB_TOKEN environment variable and the config file
    pub fn resolve(config: &Config, overrides: TargetOverrides) -> Self {
        Self {
            username: non_empty(overrides.username)
                .or_else(|| non_empty(config.github.username.clone())),
            token: non_empty(overrides.token)
                .or_else(Config::token_from_env)
                .or_else(|| non_empty(config.github.token.clone())),
            directory: non_empty(overrides.directory)
                .or_else(|| non_empty(config.backup_directory.clone())),
        }
    }

    /// Finish resolution without prompting
    pub fn complete(self) -> Result<BackupTarget> {
        let username = self
            .username
            .context("GitHub username is required (pass --username or set github.username)")?;
        let directory = self
            .directory
            .unwrap_or_else(|| DEFAULT_BACKUP_DIRECTORY.to_string());

        Ok(BackupTarget {
            username,
            token: self.token,
            backup_dir: expand_path(&directory)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    // Helper function to create a temporary config directory
    fn setup_test_config_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("repo-backup");
        (temp_dir, config_dir)
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.backup_directory.is_none());
        assert!(config.github.username.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.per_page, 100);
        assert!(config.github.include_organizations);
        assert_eq!(config.sync.git_binary, "git");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_expand_paths() {
        env::set_var("TEST_REPO_BACKUP_HOME", "/test/home");

        let mut config = Config::default();
        config.backup_directory = Some("${TEST_REPO_BACKUP_HOME}/backups".to_string());

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.backup_directory.as_deref(), Some("/test/home/backups"));

        env::remove_var("TEST_REPO_BACKUP_HOME");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        assert!(Config::load(nonexistent_path).is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let config_path = config_dir.join("config.yml");

        let mut config = Config::default();
        config.backup_directory = Some("/custom/path".to_string());
        config.github.username = Some("testuser".to_string());
        config.github.per_page = 50;

        // save creates the missing directory
        config.save(&config_path).expect("Failed to save config");

        let loaded_config = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded_config.backup_directory.as_deref(), Some("/custom/path"));
        assert_eq!(loaded_config.github.username, Some("testuser".to_string()));
        assert_eq!(loaded_config.github.per_page, 50);
        assert!(loaded_config.github.token.is_none());
    }

    #[test]
    #[serial]
    fn test_load_unexpanded_keeps_path_references() {
        env::set_var("TEST_REPO_BACKUP_ROOT", "/srv");
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let config_path = config_dir.join("config.yml");

        let mut config = Config::default();
        config.backup_directory = Some("$TEST_REPO_BACKUP_ROOT/github".to_string());
        config.save(&config_path).expect("Failed to save config");

        let raw = Config::load_unexpanded(&config_path).expect("Failed to load config");
        let expanded = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(raw.backup_directory.as_deref(), Some("$TEST_REPO_BACKUP_ROOT/github"));
        assert_eq!(expanded.backup_directory.as_deref(), Some("/srv/github"));

        env::remove_var("TEST_REPO_BACKUP_ROOT");
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("repo-backup"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
backup_directory: "/srv/backups"
github:
  username: "alice"
  token: "ghp_example"
  api_url: "http://localhost:9999"
  per_page: 10
  include_organizations: false
sync:
  git_binary: "/usr/local/bin/git"
logging:
  level: "debug"
  format: "full"
  color: false
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.backup_directory.as_deref(), Some("/srv/backups"));
        assert_eq!(config.github.username.as_deref(), Some("alice"));
        assert_eq!(config.github.token.as_deref(), Some("ghp_example"));
        assert_eq!(config.github.api_url, "http://localhost:9999");
        assert_eq!(config.github.per_page, 10);
        assert!(!config.github.include_organizations);
        assert_eq!(config.sync.git_binary, "/usr/local/bin/git");
        assert_eq!(config.logging.format, "full");
        assert!(!config.logging.color);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(include_str!("../config.example.yml"))
            .expect("Failed to parse example config");

        assert_eq!(config.backup_directory.as_deref(), Some(DEFAULT_BACKUP_DIRECTORY));
        assert_eq!(config.github.username.as_deref(), Some("octocat"));
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_yaml_parsing_partial_sections() {
        let config: Config = serde_yaml::from_str("github:\n  username: bob\n").unwrap();

        assert_eq!(config.github.username.as_deref(), Some("bob"));
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_resolve_precedence() {
        env::remove_var("GITHUB_TOKEN");

        let mut config = Config::default();
        config.github.username = Some("from-config".to_string());
        config.github.token = Some("config-token".to_string());
        config.backup_directory = Some("/from/config".to_string());

        let partial = PartialTarget::resolve(
            &config,
            TargetOverrides {
                username: Some("from-flag".to_string()),
                token: None,
                directory: Some("   ".to_string()),
            },
        );

        assert_eq!(partial.username.as_deref(), Some("from-flag"));
        assert_eq!(partial.token.as_deref(), Some("config-token"));
        // blank flags fall through to the config file
        assert_eq!(partial.directory.as_deref(), Some("/from/config"));
    }

    #[test]
    #[serial]
    fn test_env_token_beats_config_token() {
        env::set_var("GITHUB_TOKEN", "env-token");

        let mut config = Config::default();
        config.github.token = Some("config-token".to_string());

        let partial = PartialTarget::resolve(&config, TargetOverrides::default());
        assert_eq!(partial.token.as_deref(), Some("env-token"));

        env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn test_complete_applies_default_directory() {
        let target = PartialTarget {
            username: Some("alice".to_string()),
            token: None,
            directory: None,
        }
        .complete()
        .unwrap();

        assert_eq!(target.username, "alice");
        assert_eq!(target.backup_dir, PathBuf::from(DEFAULT_BACKUP_DIRECTORY));
    }

    #[test]
    fn test_complete_requires_username() {
        let err = PartialTarget::default().complete().unwrap_err();
        assert!(err.to_string().contains("username is required"));
    }
}
