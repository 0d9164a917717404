use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repo_backup::config::{LoggingConfig, PartialTarget, TargetOverrides};
use repo_backup::github::Enumeration;
use repo_backup::prompt::Collector;
use repo_backup::report::display_path;
use repo_backup::{
    run_backup, ApiError, BackupOutcome, BackupTarget, Config, ConsoleReporter, GitClient,
    GitHubClient, Reporter, SyncAction, SyncEngine,
};

#[derive(Parser)]
#[command(name = "repo-backup")]
#[command(about = "Back up every GitHub repository of a user and their organizations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// GitHub username whose repositories are backed up
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// GitHub access token (also read from GITHUB_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Backup directory (default: ./github_repos)
    #[arg(short, long, global = true)]
    dir: Option<String>,

    /// Never prompt; fail if the username is unknown
    #[arg(long, global = true)]
    no_input: bool,
}

impl TargetArgs {
    fn overrides(&self) -> TargetOverrides {
        TargetOverrides {
            username: self.username.clone(),
            token: self.token.clone(),
            directory: self.dir.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clone missing repositories and pull existing ones (default)
    Sync {
        /// Show what would be cloned or pulled without running git
        #[arg(long)]
        dry_run: bool,
    },

    /// List repositories that would be backed up
    List {
        /// Show clone URLs
        #[arg(long)]
        details: bool,
    },

    /// Write a configuration file with the given username and directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // init rewrites the file as written, and may name one that does not exist yet
    let config = match &cli.command {
        Some(Commands::Init) => load_init_config(cli.config.as_ref())?,
        _ => load_config(cli.config.as_ref())?,
    };

    init_logging(cli.verbose, &config.logging)?;
    info!("Starting repo-backup v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => cmd_sync(false, &cli.target, &config).await,
        Some(Commands::Sync { dry_run }) => cmd_sync(dry_run, &cli.target, &config).await,
        Some(Commands::List { details }) => cmd_list(details, &cli.target, &config).await,
        Some(Commands::Init) => cmd_init(&cli.target, cli.config, &config),
    }
}

/// Initialize logging; RUST_LOG wins over --verbose, which wins over the config file
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level: {}", default_level))?,
    };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(logging.color);

    match logging.format.as_str() {
        "full" => tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .init(),
        _ => tracing_subscriber::registry()
            .with(layer.compact())
            .with(filter)
            .init(),
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Existing configuration for `init`, with paths left unexpanded
fn load_init_config(config_path: Option<&PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };

    if path.exists() {
        Config::load_unexpanded(&path)
    } else {
        Ok(Config::default())
    }
}

/// Resolve the backup target, prompting only on an interactive terminal
fn resolve_target(args: &TargetArgs, config: &Config) -> Result<BackupTarget> {
    let partial = PartialTarget::resolve(config, args.overrides());

    if !args.no_input && std::io::stdin().is_terminal() {
        Collector::terminal().collect(partial)
    } else {
        partial.complete()
    }
}

/// Back up all repositories, or preview the plan with `dry_run`
async fn cmd_sync(dry_run: bool, args: &TargetArgs, config: &Config) -> Result<()> {
    let target = resolve_target(args, config)?;

    if dry_run {
        return cmd_dry_run(&target, config).await;
    }

    let git = GitClient::new(&config.sync.git_binary);
    let mut reporter = ConsoleReporter::stdout();

    match run_backup(config, &target, git, &mut reporter).await? {
        BackupOutcome::Completed(summary) => {
            info!(
                "{} of {} repositories failed",
                summary.failed, summary.total_repositories
            );
            Ok(())
        }
        BackupOutcome::Aborted { status } => {
            info!("Backup aborted: GitHub API returned {}", status);
            std::process::exit(1);
        }
    }
}

/// Print the action planned for each repository without running git
async fn cmd_dry_run(target: &BackupTarget, config: &Config) -> Result<()> {
    let mut reporter = ConsoleReporter::stdout();
    let enumeration = enumerate_or_exit(target, config, &mut reporter).await?;
    let engine = SyncEngine::new(target.backup_dir.clone(), GitClient::default());

    println!("🔍 Dry run - no repositories will be cloned or pulled");
    let total = enumeration.repositories.len();
    for (index, repo) in enumeration.repositories.iter().enumerate() {
        let (path, action) = engine.plan(repo);
        let label = match action {
            SyncAction::Clone => "clone ",
            SyncAction::Pull => "update",
        };
        println!(
            "[{}/{}] {} {} -> {}",
            index + 1,
            total,
            label,
            repo.name,
            display_path(&path).display()
        );
    }

    Ok(())
}

/// List repositories that would be backed up
async fn cmd_list(details: bool, args: &TargetArgs, config: &Config) -> Result<()> {
    let target = resolve_target(args, config)?;
    let mut reporter = ConsoleReporter::stdout();
    let enumeration = enumerate_or_exit(&target, config, &mut reporter).await?;

    println!("Repositories ({}): ", enumeration.repositories.len());

    for repo in &enumeration.repositories {
        let name = repo.full_name.as_deref().unwrap_or(&repo.name);
        if details {
            println!("📁 {}", name);
            println!("   🔗 {}", repo.clone_url);
        } else {
            println!("  📁 {}", name);
        }
    }

    Ok(())
}

/// Enumerate, exiting with status 1 when GitHub refuses the user listing
async fn enumerate_or_exit(
    target: &BackupTarget,
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<Enumeration> {
    let client = GitHubClient::from_target(config, target)?;

    let enumeration = match client.enumerate(config.github.include_organizations).await {
        Ok(enumeration) => enumeration,
        Err(e) => {
            if let Some(ApiError::Status { status, body, .. }) = e.downcast_ref::<ApiError>() {
                reporter.api_error(*status, body);
                std::process::exit(1);
            }
            return Err(e);
        }
    };

    if let Some(e) = &enumeration.organization_error {
        reporter.organization_warning(e);
    }

    Ok(enumeration)
}

/// Save username and backup directory to the configuration file
fn cmd_init(args: &TargetArgs, config_path: Option<PathBuf>, config: &Config) -> Result<()> {
    if args.token.is_some() {
        bail!("init never stores a token; export GITHUB_TOKEN or pass --token to sync instead");
    }

    let mut new_config = config.clone();

    if let Some(username) = &args.username {
        new_config.github.username = Some(username.clone());
    }
    if let Some(dir) = &args.dir {
        new_config.backup_directory = Some(dir.clone());
    }

    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    new_config.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ Configuration saved to {}", config_path.display());
    if let Some(username) = &new_config.github.username {
        println!("   Username: {}", username);
    }
    println!(
        "   Backup directory: {}",
        new_config
            .backup_directory
            .as_deref()
            .unwrap_or(repo_backup::config::DEFAULT_BACKUP_DIRECTORY)
    );
    println!("   Tip: export GITHUB_TOKEN to include private repositories");

    Ok(())
}
