//! Hearth CLI library
//!
//! This library contains all the CLI logic for hearth, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_config::Config;
use hearth_config::config::resolve_path;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::warn;

use command::Command;
use common::RuntimeContext;

/// Hearth - overlay a git repository of dotfiles onto your home directory
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Overlay a git repository of dotfiles onto your home directory")]
#[command(version)]
#[command(long_about = "Overlay a git repository of dotfiles onto your home directory

Files named <name>##<marker>,... are alternates: the one matching this host
best is written to <name>, decrypted and rendered as needed.

Markers:
  • os.<name>, distro.<id>, hostname.<name>, user.<name>, class.<label>
  • default   matches any host with the lowest priority
  • template  renders {{ hearth.<attribute> }} placeholders")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, env = "HEARTH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the repository git directory
    #[arg(long, env = "HEARTH_REPO", value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Directory the repository is overlaid onto (usually $HOME)
    #[arg(long, env = "HEARTH_WORK_TREE", value_name = "DIR")]
    pub work_tree: Option<PathBuf>,

    /// Class label matched by `##class.<label>` alternates
    #[arg(long, env = "HEARTH_CLASS", value_name = "LABEL")]
    pub class: Option<String>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "HEARTH_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for hearth CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve alternates and materialize them into the work tree
    #[command(visible_alias = "alt")]
    Apply(cmd::apply::ApplyCommand),

    /// Show what apply would change
    Status(cmd::status::StatusCommand),

    /// List tracked paths with their category and markers
    List(cmd::list::ListCommand),

    /// Show host attributes, marker kinds or repository paths
    Introspect(cmd::introspect::IntrospectCommand),

    /// Start a shell with git pointed at the repository
    Enter(cmd::enter::EnterCommand),
}

/// Load the config file and apply command line overrides
///
/// Relative override paths resolve against the current directory.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    if let Some(repo) = &cli.repo {
        config.general.repo = Some(resolve_path(repo, &cwd));
    }
    if let Some(work_tree) = &cli.work_tree {
        config.general.work_tree = Some(resolve_path(work_tree, &cwd));
    }
    if let Some(class) = &cli.class {
        config.general.class = Some(class.clone());
    }

    Ok(config)
}

/// Execute the command based on the command type
fn execute_command(command: Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Apply(apply_cmd) => {
            if !apply_cmd.dry_run {
                install_interrupt_handler(context);
            }
            apply_cmd.execute(context)?;
        }
        Commands::Status(status_cmd) => {
            status_cmd.execute(context)?;
        }
        Commands::List(list_cmd) => {
            list_cmd.execute(context)?;
        }
        Commands::Introspect(introspect_cmd) => {
            introspect_cmd.execute(context)?;
        }
        Commands::Enter(enter_cmd) => {
            let code = enter_cmd.execute(context)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

/// Turn Ctrl-C into a request to roll the transaction back
fn install_interrupt_handler(context: &RuntimeContext) {
    let interrupt = context.interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        interrupt.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install interrupt handler");
    }
}

/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - Configuration loading fails
/// - The repository location cannot be determined
/// - Command execution fails
pub fn run(cli: Cli) -> Result<()> {
    hearth_config::logging::init(cli.verbose, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let config = load_config(&cli)?;
    let context = RuntimeContext::new(config)?;

    execute_command(cli.command, &context)
}
