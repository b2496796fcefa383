//! CLI command definitions and handlers.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Load configuration with graceful fallback to defaults.
///
/// A missing or unreadable config file is not fatal for sending; the
/// problem is logged and the defaults are used.
pub fn load_config() -> wormsend_core::config::Config {
    wormsend_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable configuration: {}", e);
        wormsend_core::config::Config::default()
    })
}

pub mod check;
pub mod completions;
pub mod config;
pub mod send;

/// Wormsend - send files with magic-wormhole
#[derive(Parser)]
#[command(name = "wormsend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Send files and folders, copying the wormhole code to the clipboard
    Send(SendArgs),

    /// Check whether magic-wormhole is installed
    Check(CheckArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// Files and folders to send
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to the wormhole binary
    #[arg(long, env = "WORMSEND_TOOL")]
    pub tool: Option<PathBuf>,

    /// How long to wait for the code (e.g., 30s, 2m; 0s waits forever)
    #[arg(long)]
    pub code_timeout: Option<String>,

    /// How long to wait for the receiver (e.g., 10m, 1h; 0s waits forever)
    #[arg(short, long)]
    pub timeout: Option<String>,

    /// Don't copy anything to the clipboard
    #[arg(long, conflicts_with = "copy_command")]
    pub no_copy: bool,

    /// Copy `wormhole receive <code>` instead of the bare code
    #[arg(long)]
    pub copy_command: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the check command
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the wormhole binary
    #[arg(long, env = "WORMSEND_TOOL")]
    pub tool: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., transfer.code_timeout)
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// Show all configuration
    Show,
    /// List the available keys
    List,
    /// Print the configuration file path
    Path,
    /// Reset to defaults
    Reset,
}

/// Arguments for the completions command
#[derive(Parser)]
pub struct CompletionsArgs {
    /// Completions action
    #[command(subcommand)]
    pub action: CompletionsAction,
}

/// Shell completion actions
#[derive(Subcommand)]
pub enum CompletionsAction {
    /// Install completions for your shell
    Install {
        /// Shell to install completions for (auto-detected if not specified)
        #[arg(long, value_enum)]
        shell: Option<ShellType>,
    },

    /// Remove installed completions
    Uninstall {
        /// Shell to uninstall completions for (auto-detected if not specified)
        #[arg(long, value_enum)]
        shell: Option<ShellType>,
    },

    /// Print completions to stdout
    Generate {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Supported shells
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ShellType {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell
    Elvish,
}
