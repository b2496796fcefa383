//! Error types for wormsend.
//!
//! This module provides a unified error type for all wormsend operations,
//! with specific error variants for the ways a send can go wrong.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::Stage;

/// A specialized `Result` type for wormsend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for wormsend.
#[derive(Error, Debug)]
pub enum Error {
    /// No files or folders were given (W001)
    #[error("nothing to send: no paths given")]
    NoPaths,

    /// A path to send does not exist (W002)
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The transfer tool binary could not be found (W003)
    #[error("transfer tool not found at '{0}'")]
    ToolNotFound(String),

    /// The transfer tool could not be started
    #[error("failed to start transfer tool: {0}")]
    SpawnFailed(String),

    /// The tool exited before printing a code (W004)
    #[error("transfer tool exited before printing a code ({status})")]
    ExitedBeforeCode {
        /// Exit status description
        status: String,
    },

    /// The tool exited before the receiver confirmed (W005)
    #[error("transfer tool exited before the receiver confirmed ({status})")]
    ExitedBeforeConfirmation {
        /// Exit status description
        status: String,
    },

    /// A stage did not complete in time (W006)
    #[error("timed out after {after:?} waiting for {stage}")]
    Timeout {
        /// The stage that timed out
        stage: Stage,
        /// The configured limit
        after: Duration,
    },

    /// The transfer was cancelled
    #[error("transfer cancelled")]
    Cancelled,

    /// Clipboard access failed
    #[error("clipboard error: {0}")]
    ClipboardError(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code associated with this error, if any.
    ///
    /// Error codes follow the pattern WXXX where XXX is a 3-digit number.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::NoPaths => Some("W001"),
            Self::PathNotFound(_) => Some("W002"),
            Self::ToolNotFound(_) => Some("W003"),
            Self::ExitedBeforeCode { .. } => Some("W004"),
            Self::ExitedBeforeConfirmation { .. } => Some("W005"),
            Self::Timeout { .. } => Some("W006"),
            _ => None,
        }
    }

    /// Returns whether retrying the same send could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ExitedBeforeConfirmation { .. } | Self::Timeout { .. } | Self::Cancelled
        )
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound(_) => Some(
                "`magic-wormhole` needs to be installed:\n\
                   brew install magic-wormhole\n\
                 Or point wormsend at it:\n\
                   wormsend config set tool.path /path/to/wormhole",
            ),
            Self::ExitedBeforeCode { .. } => Some(
                "Run the tool by hand to see its output:\n\
                   wormhole send <file>",
            ),
            Self::Timeout { stage: Stage::Code, .. } => Some(
                "The rendezvous server may be unreachable. Check your connection\n\
                 or raise transfer.code_timeout.",
            ),
            Self::Timeout { stage: Stage::Confirmation, .. } => Some(
                "Nobody received the file in time. Raise transfer.confirm_timeout\n\
                 or set it to 0s to wait forever.",
            ),
            _ => None,
        }
    }
}
