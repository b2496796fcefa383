//! Clipboard writes.
//!
//! The front end puts the exchange code, or the full receive command, on the
//! clipboard so the user can paste it to whoever is receiving.

use arboard::Clipboard;

use crate::error::{Error, Result};

/// Write access to a clipboard.
pub trait ClipboardAccess: Send {
    /// Replace the clipboard content with `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Native clipboard implementation using arboard.
pub struct NativeClipboard {
    clipboard: Clipboard,
}

impl NativeClipboard {
    /// Create a new native clipboard accessor.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard cannot be accessed.
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new()
            .map_err(|e| Error::ClipboardError(format!("failed to access clipboard: {e}")))?;
        Ok(Self { clipboard })
    }
}

impl ClipboardAccess for NativeClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| Error::ClipboardError(format!("failed to set text: {e}")))?;
        tracing::trace!("Clipboard: wrote {} bytes of text", text.len());
        Ok(())
    }
}

/// In-memory clipboard for headless runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    #[must_use]
    pub const fn new() -> Self {
        Self { contents: None }
    }

    /// Last text written, if any.
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// Open the system clipboard, or `None` when there is none (no display
/// server, SSH session).
///
/// Keep the returned value alive for as long as the text should stay on the
/// clipboard; on X11 the content goes away with its owner.
pub fn open_system() -> Option<Box<dyn ClipboardAccess>> {
    match NativeClipboard::new() {
        Ok(clipboard) => Some(Box::new(clipboard)),
        Err(e) => {
            tracing::warn!("Clipboard unavailable, codes will only be printed: {}", e);
            None
        }
    }
}

/// Write `text`, logging instead of failing. Returns whether it was written.
pub fn copy_text(clipboard: &mut dyn ClipboardAccess, text: &str) -> bool {
    match clipboard.write_text(text) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to copy to clipboard: {}", e);
            false
        }
    }
}
