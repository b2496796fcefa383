//! Subprocess handle for the transfer tool.
//!
//! [`ToolProcess`] owns one running child and turns it into a stream of
//! [`ProcessEvent`]s: one event per output line, then exactly one
//! [`ProcessEvent::Exited`] after the child has exited and its pipes have
//! drained. Dropping the handle kills the child, so closing the front end
//! never leaves a send running in the background.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::parser::LineSplitter;

/// How long to wait for output pipes to drain after the child exits.
///
/// A grandchild that inherited the pipes can keep them open indefinitely.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Capacity of the event channel between the reader tasks and the owner.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Read buffer size for the output pipes.
const READ_BUF_SIZE: usize = 4096;

/// How the child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Whether the process reported success
    pub success: bool,
    description: String,
}

impl ExitInfo {
    fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
            description: status.to_string(),
        }
    }

    fn unknown(reason: impl fmt::Display) -> Self {
        Self {
            code: None,
            success: false,
            description: format!("exit status unknown: {reason}"),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Something the child process did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A line written to stdout
    Stdout(String),
    /// A line written to stderr
    Stderr(String),
    /// The process exited; always the last event
    Exited(ExitInfo),
}

/// Handle to a running transfer tool process.
#[derive(Debug)]
pub struct ToolProcess {
    program: PathBuf,
    pid: Option<u32>,
    events: mpsc::Receiver<ProcessEvent>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ToolProcess {
    /// Spawn `program` with `args`.
    ///
    /// stdin is closed; stdout and stderr are read line by line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if the binary does not exist and
    /// [`Error::SpawnFailed`] for any other spawn failure.
    pub fn spawn<I, S>(program: &Path, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::ToolNotFound(program.display().to_string())
                }
                _ => Error::SpawnFailed(format!("{}: {e}", program.display())),
            })?;

        let pid = child.id();
        tracing::debug!("spawned {} (pid {:?})", program.display(), pid);

        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (kill_tx, kill_rx) = oneshot::channel();

        let stdout = child.stdout.take().map(|pipe| {
            tokio::spawn(pump_lines(pipe, event_tx.clone(), ProcessEvent::Stdout))
        });
        let stderr = child.stderr.take().map(|pipe| {
            tokio::spawn(pump_lines(pipe, event_tx.clone(), ProcessEvent::Stderr))
        });

        tokio::spawn(supervise(child, kill_rx, [stdout, stderr], event_tx));

        Ok(Self {
            program: program.to_path_buf(),
            pid,
            events,
            kill_tx: Some(kill_tx),
        })
    }

    /// The program this handle is running.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// OS process id, if the child was still running when spawned.
    pub const fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the next event.
    ///
    /// Returns `None` after [`ProcessEvent::Exited`] once every output pipe
    /// has closed.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Ask the child to terminate.
    ///
    /// The matching [`ProcessEvent::Exited`] still arrives through
    /// [`ToolProcess::next_event`].
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            tracing::debug!("killing {} (pid {:?})", self.program.display(), self.pid);
            let _ = tx.send(());
        }
    }
}

/// Forward every line of `pipe` as an event.
async fn pump_lines<R, F>(mut pipe: R, tx: mpsc::Sender<ProcessEvent>, wrap: F)
where
    R: AsyncRead + Unpin,
    F: Fn(String) -> ProcessEvent,
{
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("output pipe read failed: {}", e);
                break;
            }
        };

        for line in splitter.push(&buf[..n]) {
            if tx.send(wrap(line)).await.is_err() {
                return;
            }
        }
    }

    if let Some(line) = splitter.finish() {
        let _ = tx.send(wrap(line)).await;
    }
}

/// Wait for the child (or a kill request), drain the readers, then report
/// the exit.
async fn supervise(
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
    readers: [Option<JoinHandle<()>>; 2],
    tx: mpsc::Sender<ProcessEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("failed to kill child: {}", e);
            }
            child.wait().await
        }
    };

    let drain = async {
        for reader in readers.into_iter().flatten() {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::debug!("output pipes still open after exit, dropping remaining output");
    }

    let info = match status {
        Ok(status) => ExitInfo::from_status(status),
        Err(e) => ExitInfo::unknown(e),
    };
    tracing::debug!("transfer tool exited: {}", info);
    let _ = tx.send(ProcessEvent::Exited(info)).await;
}
