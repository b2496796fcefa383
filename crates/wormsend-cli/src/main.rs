//! Wormsend CLI - send files with magic-wormhole
//!
//! Wormsend runs `wormhole send`, puts the exchange code on the clipboard as
//! soon as the tool prints it, and reports when the receiver confirms.
//!
//! ## Quick Start
//!
//! ```bash
//! # Send a file; the code lands on the clipboard
//! wormsend send ./document.pdf
//!
//! # On the other computer
//! wormhole receive 7-crossover-clockwork
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let scripted = matches!(&cli.command, Command::Send(args) if args.quiet || args.json);
    init_logging(default_filter(cli.verbose, scripted));

    match cli.command {
        Command::Send(args) => commands::send::run(args).await,
        Command::Check(args) => commands::check::run(&args),
        Command::Config(args) => commands::config::run(args),
        Command::Completions(args) => commands::completions::run(args.action),
    }
}

/// Log filter used when `RUST_LOG` is unset.
///
/// Scripted output (`--quiet`, `--json`) only logs warnings unless
/// `--verbose` asks for more.
const fn default_filter(verbose: bool, scripted: bool) -> &'static str {
    if verbose {
        "info,wormsend=debug,wormsend_core=debug"
    } else if scripted {
        "warn"
    } else {
        "warn,wormsend=info,wormsend_core=info"
    }
}

fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
