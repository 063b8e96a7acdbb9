//! Quorum CLI - Command line interface for Quorum
//!
//! Automatic reviewer assignment driven by per-project rules.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quorum_core::{CliOverrides, Config, DispatchMode, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{AssignArgs, MatchArgs, RulesArgs, ScoreArgs, ValidateArgs};

/// Quorum: automatic reviewers for code changes
#[derive(Parser, Debug)]
#[command(name = "quorum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/quorum/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding <project>/reviewers.toml
    #[arg(long, global = true)]
    rules_dir: Option<PathBuf>,

    /// Run assignments inline instead of on the worker pool
    #[arg(long, global = true)]
    direct: bool,

    /// Add blame-based reviewers
    #[arg(long, global = true)]
    blame: bool,

    /// Post the matched rules as a message
    #[arg(long, global = true)]
    comment: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            rules_dir: self.rules_dir.clone(),
            dispatch_mode: self.direct.then_some(DispatchMode::Direct),
            blame: self.blame.then_some(true),
            max_reviewers: None,
            comment: self.comment.then_some(true),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Check a project rules file
    Validate(ValidateArgs),

    /// Dry run: matched rules and resulting assignment for a change
    #[command(name = "match")]
    Match(MatchArgs),

    /// Blame ranking of a local commit
    Score(ScoreArgs),

    /// Add reviewers to a GitHub pull request
    Assign(AssignArgs),

    /// Edit or show project rules
    Rules(RulesArgs),

    /// Show current configuration
    Config,

    /// Create a secrets file template
    InitSecrets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(cli.config.as_deref(), &cli.overrides())?;

    if cli.verbose {
        tracing::debug!(
            mode = ?config.dispatch.mode,
            blame = config.blame.enabled,
            merge_filters = config.automation.merge_filters,
            "Configuration loaded"
        );
    }

    match &cli.command {
        Some(Commands::Version) => {
            println!("quorum {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Validate(args)) => args.execute()?,
        Some(Commands::Match(args)) => args.execute(&config).await?,
        Some(Commands::Score(args)) => args.execute(&config).await?,
        Some(Commands::Assign(args)) => args.execute(&config).await?,
        Some(Commands::Rules(args)) => args.execute(&config).await?,
        Some(Commands::Config) => {
            println!("Quorum Configuration");
            println!("====================");
            println!();
            print!("{}", config.to_toml()?);
            println!();
            println!("Rules directory: {}", config.rules.dir()?.display());
            match cli.config.clone().or_else(Config::default_config_path) {
                Some(path) if path.exists() => println!("Config file: {}", path.display()),
                Some(path) => println!("Config file: {} (not found - using defaults)", path.display()),
                None => println!("Config file: (none)"),
            }
            let token = if Secrets::load()?.github_token().is_some() {
                "set"
            } else {
                "not set"
            };
            println!("GitHub token: {}", token);
        }
        Some(Commands::InitSecrets) => {
            let path = Secrets::default_secrets_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine secrets path"))?;
            Secrets::create_template(&path)?;
            println!("Created {}", path.display());
        }
        None => {
            println!("Quorum - automatic reviewers for code changes");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
