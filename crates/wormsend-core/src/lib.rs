//! # wormsend Core Library
//!
//! `wormsend-core` drives the `magic-wormhole` command line tool in send
//! mode and turns its human-readable output into typed events.
//!
//! The tool prints everything interesting on stderr: the exchange code, a
//! "Sending" status line naming the connecting peer, a progress bar, and a
//! final confirmation. This crate scrapes those lines and exposes them as a
//! two-stage result: first the code, then the confirmed transfer.
//!
//! ## Modules
//!
//! - [`clipboard`] - Clipboard writes for the code and receive command
//! - [`config`] - Configuration management
//! - [`install`] - Tool installation checks
//! - [`parser`] - Line-to-event mapping for the tool's stderr
//! - [`process`] - Subprocess handle with line and exit events
//! - [`session`] - Send state machine
//! - [`transfer`] - The send driver tying it all together
//!
//! ## Example
//!
//! ```rust,ignore
//! use wormsend_core::transfer::{send, SendRequest};
//!
//! let pending = send(SendRequest::new(vec!["report.pdf".into()])).await?;
//! let ready = pending.code().await?;
//! println!("Code: {}", ready.code);
//!
//! let receipt = ready.completion.wait().await?;
//! println!("Sent to {}", receipt.receiver);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]

pub mod clipboard;
pub mod config;
pub mod error;
pub mod install;
pub mod parser;
pub mod process;
pub mod session;
pub mod transfer;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default location of the `wormhole` binary (Homebrew on Apple Silicon).
pub const DEFAULT_TOOL_PATH: &str = "/opt/homebrew/bin/wormhole";

/// Environment variable overriding the configured tool path.
pub const TOOL_PATH_ENV: &str = "WORMSEND_TOOL";

/// Subcommand passed to the tool to start a send.
pub const SEND_SUBCOMMAND: &str = "send";

/// Build the command a receiver runs to accept a transfer.
pub fn receive_command(code: &str) -> String {
    format!("wormhole receive {code}")
}
