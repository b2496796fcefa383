//! Configuration management for wormsend.
//!
//! This module handles loading, saving, and managing wormsend configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/wormsend/config.toml` |
//! | macOS | `~/Library/Application Support/com.wormsend.wormsend/config.toml` |
//! | Windows | `%APPDATA%\wormsend\wormsend\config\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [tool]
//! path = "/usr/local/bin/wormhole"
//! verify_install = true
//!
//! [transfer]
//! code_timeout = "30s"
//! confirm_timeout = "10m"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for wormsend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transfer tool settings
    pub tool: ToolConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// UI settings
    pub ui: UiConfig,
}

/// Transfer tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Path to the `wormhole` binary
    pub path: PathBuf,
    /// Probe the binary before sending instead of assuming it is installed
    pub verify_install: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(crate::DEFAULT_TOOL_PATH),
            verify_install: false,
        }
    }
}

/// Transfer configuration options.
///
/// A zero duration disables the corresponding timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// How long to wait for the tool to print the exchange code
    #[serde(with = "humantime_serde")]
    pub code_timeout: Duration,
    /// How long to wait for the receiver to confirm
    #[serde(with = "humantime_serde")]
    pub confirm_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            code_timeout: Duration::from_secs(60),
            confirm_timeout: Duration::ZERO,
        }
    }
}

impl TransferConfig {
    /// Code timeout, or `None` when disabled.
    pub fn code_timeout(&self) -> Option<Duration> {
        non_zero(self.code_timeout)
    }

    /// Confirmation timeout, or `None` when disabled.
    pub fn confirm_timeout(&self) -> Option<Duration> {
        non_zero(self.confirm_timeout)
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

/// UI configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Copy the code to the clipboard as soon as it is known
    pub copy_code: bool,
    /// Show the receive command next to the code
    pub show_receive_command: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            copy_code: true,
            show_receive_command: true,
        }
    }
}

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "tool.path",
    "tool.verify_install",
    "transfer.code_timeout",
    "transfer.confirm_timeout",
    "ui.copy_code",
    "ui.show_receive_command",
];

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it's missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "wormsend", "wormsend")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Tool path, honoring the `WORMSEND_TOOL` environment override.
    #[must_use]
    pub fn tool_path(&self) -> PathBuf {
        match std::env::var_os(crate::TOOL_PATH_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.tool.path.clone(),
        }
    }

    /// Read a value by dotted key, formatted as it would be written.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "tool.path" => Some(self.tool.path.display().to_string()),
            "tool.verify_install" => Some(self.tool.verify_install.to_string()),
            "transfer.code_timeout" => Some(format_duration(self.transfer.code_timeout)),
            "transfer.confirm_timeout" => Some(format_duration(self.transfer.confirm_timeout)),
            "ui.copy_code" => Some(self.ui.copy_code.to_string()),
            "ui.show_receive_command" => Some(self.ui.show_receive_command.to_string()),
            _ => None,
        }
    }

    /// Set a value by dotted key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidConfig {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let parse_bool = |v: &str| {
            v.parse::<bool>()
                .map_err(|_| invalid("expected true or false"))
        };
        let parse_dur = |v: &str| {
            parse_duration(v).ok_or_else(|| invalid("expected a duration like 30s, 5m or 1h"))
        };

        match key {
            "tool.path" => {
                if value.trim().is_empty() {
                    return Err(invalid("path cannot be empty"));
                }
                self.tool.path = PathBuf::from(value);
            }
            "tool.verify_install" => self.tool.verify_install = parse_bool(value)?,
            "transfer.code_timeout" => self.transfer.code_timeout = parse_dur(value)?,
            "transfer.confirm_timeout" => self.transfer.confirm_timeout = parse_dur(value)?,
            "ui.copy_code" => self.ui.copy_code = parse_bool(value)?,
            "ui.show_receive_command" => self.ui.show_receive_command = parse_bool(value)?,
            _ => return Err(invalid("unknown configuration key")),
        }
        Ok(())
    }
}

/// Parse a duration string like "30s", "5m" or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix('s') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num.checked_mul(60)?))
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num.checked_mul(3600)?))
    } else {
        None
    }
}

/// Format a duration the way [`parse_duration`] reads it.
pub fn format_duration(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{s}'")))
    }
}
