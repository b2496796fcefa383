//! UI utilities for the wormsend CLI.
//!
//! The terminal stands in for a small form: a file picker (the paths on the
//! command line), a code display, toast-style status lines, and the actions
//! that become available once a code exists.

use std::fmt;
use std::path::PathBuf;

use wormsend_core::receive_command;
use wormsend_core::transfer::display_name;

const BOX_WIDTH: usize = 41;

/// Spinner animation frames (Braille pattern)
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A formatted box for displaying the exchange code.
pub struct CodeBox<'a> {
    code: &'a str,
    show_receive_command: bool,
}

impl<'a> CodeBox<'a> {
    /// Create a new code box.
    #[must_use]
    pub const fn new(code: &'a str) -> Self {
        Self {
            code,
            show_receive_command: false,
        }
    }

    /// Also show the command the receiver should run.
    #[must_use]
    pub const fn with_receive_command(mut self, show: bool) -> Self {
        self.show_receive_command = show;
        self
    }

    /// Render the box as lines.
    pub fn lines(&self) -> Vec<String> {
        let code_line = format!("Code:  {}", self.code);
        let width = BOX_WIDTH.max(code_line.chars().count() + 4);

        let mut lines = vec![
            format!("  ┌{}┐", "─".repeat(width)),
            format!("  │{}│", " ".repeat(width)),
            format!("  │{}│", center_in_box(&code_line, width)),
            format!("  │{}│", " ".repeat(width)),
        ];

        if self.show_receive_command {
            let command = receive_command(self.code);
            let width_ok = command.chars().count() <= width;
            if width_ok {
                lines.push(format!("  │{}│", center_in_box("On the other computer, run:", width)));
                lines.push(format!("  │{}│", center_in_box(&command, width)));
                lines.push(format!("  │{}│", " ".repeat(width)));
            }
        }

        lines.push(format!("  └{}┘", "─".repeat(width)));
        lines
    }

    /// Display the code box to stdout.
    pub fn display(&self) {
        for line in self.lines() {
            println!("{line}");
        }
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Visual style of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStyle {
    /// Work in progress
    Animated,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failure,
}

/// A one-line status notification with a title and optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Style
    pub style: ToastStyle,
    /// Title
    pub title: String,
    /// Detail message
    pub message: Option<String>,
}

impl Toast {
    /// Print the toast to stderr, or stdout for successes.
    pub fn display(&self) {
        if self.style == ToastStyle::Failure {
            eprintln!("{self}");
        } else {
            println!("{self}");
        }
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.style {
            ToastStyle::Animated => "..",
            ToastStyle::Success => "ok",
            ToastStyle::Failure => "!!",
        };
        write!(f, "  [{marker}] {}", self.title)?;
        if let Some(message) = &self.message {
            write!(f, "\n       {message}")?;
        }
        Ok(())
    }
}

/// An action offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    /// Start the send
    Send {
        /// Display name of the first path
        filename: String,
    },
    /// Copy the exchange code
    CopyCode(String),
    /// Copy `wormhole receive <code>`
    CopyReceiveCommand(String),
}

impl FormAction {
    /// Title shown for the action.
    pub fn title(&self) -> String {
        match self {
            Self::Send { filename } => format!("Send {filename}"),
            Self::CopyCode(_) => "Copy Code to Clipboard".to_string(),
            Self::CopyReceiveCommand(_) => "Copy Receive Command to Clipboard".to_string(),
        }
    }

    /// Text a copy action puts on the clipboard.
    pub fn clipboard_content(&self) -> Option<String> {
        match self {
            Self::Send { .. } => None,
            Self::CopyCode(code) => Some(code.clone()),
            Self::CopyReceiveCommand(code) => Some(receive_command(code)),
        }
    }
}

/// State of the send form across one transfer.
#[derive(Debug, Clone)]
pub struct FormState {
    files: Vec<PathBuf>,
    code: Option<String>,
    is_loading: bool,
    tool_installed: bool,
    toast: Option<Toast>,
}

impl FormState {
    /// Form for `files`, with the outcome of the installation check.
    pub const fn new(files: Vec<PathBuf>, tool_installed: bool) -> Self {
        Self {
            files,
            code: None,
            is_loading: false,
            tool_installed,
            toast: None,
        }
    }

    /// Name of the first selected path.
    pub fn filename(&self) -> Option<String> {
        self.files.first().map(|p| display_name(p))
    }

    /// The exchange code once known.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Whether the form is waiting on the receiver.
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether the transfer tool was found.
    pub const fn tool_installed(&self) -> bool {
        self.tool_installed
    }

    /// Current toast, if any.
    pub const fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    /// Form description shown instead of the picker when the tool is missing.
    pub const fn missing_tool_description() -> &'static str {
        "`magic-wormhole` needs to be installed"
    }

    /// Title of the action panel.
    pub fn actions_title(&self) -> String {
        format!(
            "Actions for {}",
            self.filename().unwrap_or_else(|| "nothing".to_string())
        )
    }

    /// Actions currently available.
    pub fn actions(&self) -> Vec<FormAction> {
        let mut actions = Vec::new();
        if let Some(filename) = self.filename() {
            actions.push(FormAction::Send { filename });
        }
        if let Some(code) = &self.code {
            actions.push(FormAction::CopyCode(code.clone()));
            actions.push(FormAction::CopyReceiveCommand(code.clone()));
        }
        actions
    }

    /// Stage 1 resolved: show the code and start waiting.
    pub fn on_code(&mut self, code: &str, copied: bool) -> &Toast {
        self.code = Some(code.to_string());
        self.is_loading = true;
        let message = if copied {
            format!("Copied code \"{code}\" to Clipboard")
        } else {
            format!("Code is \"{code}\"")
        };
        self.toast.insert(Toast {
            style: ToastStyle::Animated,
            title: "Sending file...".to_string(),
            message: Some(message),
        })
    }

    /// Stage 2 resolved: the receiver confirmed.
    pub fn on_confirmed(&mut self, receiver: &str) -> &Toast {
        self.is_loading = false;
        let name = self.filename().unwrap_or_default();
        let message = if receiver.is_empty() {
            format!("{name} has been sent successfully")
        } else {
            format!("{name} has been sent successfully to {receiver}")
        };
        self.toast.insert(Toast {
            style: ToastStyle::Success,
            title: format!("{name} sent successfully"),
            message: Some(message),
        })
    }

    /// The send failed at either stage.
    pub fn on_failed(&mut self, error: &dyn fmt::Display) -> &Toast {
        self.is_loading = false;
        let name = self.filename().unwrap_or_default();
        self.toast.insert(Toast {
            style: ToastStyle::Failure,
            title: format!("Failed to send {name}"),
            message: Some(error.to_string()),
        })
    }
}
