//! Line parsing for the transfer tool's stderr.
//!
//! `wormhole send` reports progress as free text. A typical run looks like:
//!
//! ```text
//! Sending 7 Bytes file named 'notes.txt'
//! Wormhole code is: 7-crossover-clockwork
//! On the other computer, please run:
//!
//! wormhole receive 7-crossover-clockwork
//!
//! Sending (<-192.168.1.5:4321)..
//! 100%|█████████| 7.00/7.00 [00:00<00:00, 11.2B/s]
//! File sent.. waiting for confirmation
//! Confirmation received. Transfer complete.
//! ```
//!
//! [`parse_line`] maps a single line to a [`ToolEvent`]. Matching is by
//! exact, case-sensitive prefix, so it breaks if the tool's wording changes.
//! [`LineSplitter`] turns the raw byte stream into lines, splitting on both
//! `\n` and `\r` because the progress bar redraws itself with carriage
//! returns.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix of the line carrying the exchange code.
pub const CODE_PREFIX: &str = "Wormhole code is: ";

/// Prefix of the tool's "sending" status lines.
pub const SENDING_PREFIX: &str = "Sending ";

/// Prefix of the line printed once the receiver has confirmed.
pub const CONFIRMATION_PREFIX: &str = "Confirmation received";

static RECEIVER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(<-.+\)").expect("receiver pattern is valid"));

static PROGRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3})%\|").expect("progress pattern is valid"));

/// A one-time code pairing sender and receiver, e.g. `7-crossover-clockwork`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeCode(String);

impl ExchangeCode {
    /// Wrap a code token. Returns `None` for blank input.
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == code.len() {
            Some(Self(code))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the code, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExchangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExchangeCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Something the tool reported on one line of stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    /// The exchange code was printed.
    Code(ExchangeCode),
    /// A "Sending ..." status line. `receiver` holds the `(<-...)` fragment
    /// when the line names the connecting peer.
    Sending {
        /// Receiver descriptor including the parentheses
        receiver: Option<String>,
    },
    /// Progress bar update, in percent.
    Progress(u8),
    /// The receiver confirmed the transfer.
    Confirmed,
}

/// Map one line of tool output to an event.
///
/// Returns `None` for lines that carry nothing we track.
pub fn parse_line(line: &str) -> Option<ToolEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(CODE_PREFIX) {
        return rest
            .split_whitespace()
            .last()
            .and_then(ExchangeCode::new)
            .map(ToolEvent::Code);
    }

    if line.starts_with(SENDING_PREFIX) {
        let receiver = RECEIVER_REGEX
            .find(line)
            .map(|m| m.as_str().to_string());
        return Some(ToolEvent::Sending { receiver });
    }

    if line.starts_with(CONFIRMATION_PREFIX) {
        return Some(ToolEvent::Confirmed);
    }

    parse_progress(line).map(ToolEvent::Progress)
}

/// Extract the percentage from a progress bar line like ` 45%|####  | ...`.
fn parse_progress(line: &str) -> Option<u8> {
    let caps = PROGRESS_REGEX.captures(line)?;
    let pct: u16 = caps.get(1)?.as_str().parse().ok()?;
    u8::try_from(pct.min(100)).ok()
}

/// Incremental splitter turning stderr chunks into lines.
///
/// Chunks may end mid-line; the remainder is buffered until the next
/// separator or [`LineSplitter::finish`]. Empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    /// Create an empty splitter.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.buf.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                    self.buf.clear();
                }
            } else {
                self.buf.push(byte);
            }
        }
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}
