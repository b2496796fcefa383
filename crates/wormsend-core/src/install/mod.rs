//! Transfer tool installation checks.
//!
//! The front end asks an [`InstallCheck`] whether the tool is present before
//! showing the send form. [`AssumeInstalled`] is the default and always
//! answers yes; [`VersionProbe`] actually runs `<tool> --version`.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;

/// Decides whether the transfer tool is usable.
pub trait InstallCheck: Send + Sync {
    /// Whether `tool` looks installed.
    fn is_installed(&self, tool: &Path) -> bool;
}

/// Check that always reports the tool as installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeInstalled;

impl InstallCheck for AssumeInstalled {
    fn is_installed(&self, _tool: &Path) -> bool {
        true
    }
}

/// How long `<tool> --version` may run before the probe gives up.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Check that runs `<tool> --version`.
///
/// The tool counts as installed if it could be executed and exited within
/// the timeout, whatever its exit status. A tool still running at the
/// deadline is killed and counts as not installed.
#[derive(Debug, Clone, Copy)]
pub struct VersionProbe {
    timeout: Duration,
}

impl VersionProbe {
    /// Probe with a custom timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for VersionProbe {
    fn default() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }
}

impl InstallCheck for VersionProbe {
    fn is_installed(&self, tool: &Path) -> bool {
        let spawned = Command::new(tool)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("{} is not runnable: {}", tool.display(), e);
                return false;
            }
        };

        let start = Instant::now();
        while start.elapsed() <= self.timeout {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("{} --version exited with {}", tool.display(), status);
                    return true;
                }
                Ok(None) => thread::sleep(Duration::from_millis(25)),
                Err(e) => {
                    tracing::debug!("waiting on {} failed: {}", tool.display(), e);
                    return false;
                }
            }
        }

        tracing::warn!(
            "{} --version still running after {:?}, giving up",
            tool.display(),
            self.timeout
        );
        let _ = child.kill();
        let _ = child.wait();
        false
    }
}

/// Pick the check configured by `tool.verify_install`.
pub fn check_for(config: &Config) -> Box<dyn InstallCheck> {
    if config.tool.verify_install {
        Box::new(VersionProbe::default())
    } else {
        Box::new(AssumeInstalled)
    }
}
