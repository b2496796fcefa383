//! Send driver.
//!
//! [`send`] starts `<tool> send <path>...` and returns a [`PendingTransfer`].
//! A background task owns the [`ToolProcess`], feeds every stderr line
//! through [`parse_line`] into a [`SendSession`], and resolves the two
//! stages as the session moves:
//!
//! 1. [`PendingTransfer::code`] resolves with the exchange code.
//! 2. [`TransferCompletion::wait`] resolves with the receiver once the tool
//!    reports the confirmation.
//!
//! If the process exits, a stage timeout fires, or the transfer is
//! cancelled first, the pending stage resolves with an error instead.
//! Dropping every handle cancels the transfer and kills the tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch, Notify};
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::{parse_line, ExchangeCode};
use crate::process::{ProcessEvent, ToolProcess};
use crate::session::{FailureReason, SendSession, SendState, Stage, Transition};

/// How long a confirmed send may keep running before the tool is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start a send.
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Files and folders to send, passed to the tool in order
    pub paths: Vec<PathBuf>,
    /// Path to the `wormhole` binary
    pub tool: PathBuf,
    /// Limit on waiting for the code
    pub code_timeout: Option<Duration>,
    /// Limit on waiting for the confirmation, counted from the code
    pub confirm_timeout: Option<Duration>,
}

impl SendRequest {
    /// Request with the default tool path and no timeouts.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            tool: PathBuf::from(crate::DEFAULT_TOOL_PATH),
            code_timeout: None,
            confirm_timeout: None,
        }
    }

    /// Request using the tool path and timeouts from `config`.
    #[must_use]
    pub fn from_config(paths: Vec<PathBuf>, config: &Config) -> Self {
        Self {
            paths,
            tool: config.tool_path(),
            code_timeout: config.transfer.code_timeout(),
            confirm_timeout: config.transfer.confirm_timeout(),
        }
    }

    /// Use a different tool binary.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Set the code timeout.
    #[must_use]
    pub const fn with_code_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.code_timeout = timeout;
        self
    }

    /// Set the confirmation timeout.
    #[must_use]
    pub const fn with_confirm_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Arguments passed to the tool: `send` followed by every path.
    pub fn args(&self) -> Vec<OsString> {
        std::iter::once(OsString::from(crate::SEND_SUBCOMMAND))
            .chain(self.paths.iter().map(|p| p.as_os_str().to_os_string()))
            .collect()
    }

    /// File name of the first path, used as the transfer's display name.
    pub fn display_name(&self) -> Option<String> {
        self.paths.first().map(|p| display_name(p))
    }
}

/// Final component of `path`, or the whole path if it has none (`/`, `..`).
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Snapshot of a send, published on a watch channel.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Current state
    pub state: SendState,
    /// Exchange code, once known
    pub code: Option<ExchangeCode>,
    /// Last captured receiver
    pub receiver: Option<String>,
    /// Last progress bar percentage
    pub percent: Option<u8>,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self {
            state: SendState::Started,
            code: None,
            receiver: None,
            percent: None,
        }
    }
}

impl TransferProgress {
    fn from_session(session: &SendSession) -> Self {
        Self {
            state: session.state(),
            code: session.code().cloned(),
            receiver: session.receiver().map(String::from),
            percent: session.progress(),
        }
    }
}

/// Result of a confirmed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// The code the receiver used
    pub code: ExchangeCode,
    /// Receiver descriptor as printed by the tool, `""` if it never said
    pub receiver: String,
    /// Time from spawning the tool to the confirmation
    pub elapsed: Duration,
}

/// Cloneable handle that cancels a running send.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    notify: Arc<Notify>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    /// Cancel the send. The pending stage resolves with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.notify.notify_one();
    }
}

/// A send waiting for its exchange code (stage 1).
#[derive(Debug)]
pub struct PendingTransfer {
    code_rx: oneshot::Receiver<Result<ExchangeCode>>,
    done_rx: oneshot::Receiver<Result<TransferReceipt>>,
    progress_rx: watch::Receiver<TransferProgress>,
    cancel: CancelHandle,
    pid: Option<u32>,
}

impl PendingTransfer {
    /// Wait for the exchange code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExitedBeforeCode`], [`Error::Timeout`] or
    /// [`Error::Cancelled`] if the code never arrives.
    pub async fn code(self) -> Result<CodeReady> {
        let code = self.code_rx.await.map_err(driver_gone)??;
        Ok(CodeReady {
            code,
            completion: TransferCompletion {
                done_rx: self.done_rx,
                progress_rx: self.progress_rx,
                cancel: self.cancel,
            },
        })
    }

    /// Subscribe to progress snapshots.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress_rx.clone()
    }

    /// Handle for cancelling the send from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the send.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// OS process id of the tool.
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Stage 1 result: the code, plus the handle for stage 2.
#[derive(Debug)]
pub struct CodeReady {
    /// The exchange code
    pub code: ExchangeCode,
    /// Stage 2
    pub completion: TransferCompletion,
}

/// A send waiting for the receiver to confirm (stage 2).
#[derive(Debug)]
pub struct TransferCompletion {
    done_rx: oneshot::Receiver<Result<TransferReceipt>>,
    progress_rx: watch::Receiver<TransferProgress>,
    cancel: CancelHandle,
}

impl TransferCompletion {
    /// Wait for the confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExitedBeforeConfirmation`], [`Error::Timeout`] or
    /// [`Error::Cancelled`] if the receiver never confirms.
    pub async fn wait(self) -> Result<TransferReceipt> {
        self.done_rx.await.map_err(driver_gone)?
    }

    /// Subscribe to progress snapshots.
    pub fn progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress_rx.clone()
    }

    /// Handle for cancelling the send from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the send.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

fn driver_gone(_: oneshot::error::RecvError) -> Error {
    Error::Internal("send driver stopped without a result".to_string())
}

/// Start a send.
///
/// # Errors
///
/// Returns [`Error::NoPaths`] for an empty request, [`Error::PathNotFound`]
/// for a missing path, and spawn errors from [`ToolProcess::spawn`].
pub async fn send(request: SendRequest) -> Result<PendingTransfer> {
    if request.paths.is_empty() {
        return Err(Error::NoPaths);
    }
    if let Some(missing) = request.paths.iter().find(|p| !p.exists()) {
        return Err(Error::PathNotFound(missing.display().to_string()));
    }

    let process = ToolProcess::spawn(&request.tool, request.args())?;
    let pid = process.id();
    tracing::info!(
        "sending {} path(s) with {}",
        request.paths.len(),
        request.tool.display()
    );

    let (code_tx, code_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
    let cancel = CancelHandle::new();

    let driver = Driver {
        process,
        session: SendSession::new(),
        code_tx: Some(code_tx),
        done_tx: Some(done_tx),
        progress_tx,
        cancel: cancel.notify.clone(),
        code_timeout: request.code_timeout,
        confirm_timeout: request.confirm_timeout,
    };
    tokio::spawn(driver.run());

    Ok(PendingTransfer {
        code_rx,
        done_rx,
        progress_rx,
        cancel,
        pid,
    })
}

/// What woke the driver up.
enum Step {
    Event(Option<ProcessEvent>),
    TimedOut(Stage),
    Cancelled,
    Abandoned,
}

struct Driver {
    process: ToolProcess,
    session: SendSession,
    code_tx: Option<oneshot::Sender<Result<ExchangeCode>>>,
    done_tx: Option<oneshot::Sender<Result<TransferReceipt>>>,
    progress_tx: watch::Sender<TransferProgress>,
    cancel: Arc<Notify>,
    code_timeout: Option<Duration>,
    confirm_timeout: Option<Duration>,
}

impl Driver {
    async fn run(mut self) {
        let started = Instant::now();
        let mut stage_started = started;
        let mut confirmed_at: Option<Instant> = None;

        loop {
            let stage = self.session.pending_stage();
            let deadline = match confirmed_at {
                Some(at) => deadline_after(at, EXIT_GRACE),
                None => self
                    .timeout_for(stage)
                    .and_then(|t| deadline_after(stage_started, t)),
            };

            let step = {
                let done_tx = &mut self.done_tx;
                tokio::select! {
                    event = self.process.next_event() => Step::Event(event),
                    () = sleep_until(deadline) => Step::TimedOut(stage),
                    () = self.cancel.notified() => Step::Cancelled,
                    () = receiver_dropped(done_tx) => Step::Abandoned,
                }
            };

            match step {
                Step::Event(Some(ProcessEvent::Stderr(line))) => {
                    tracing::debug!("tool: {}", line);
                    let Some(event) = parse_line(&line) else {
                        continue;
                    };
                    let Some(transition) = self.session.apply(event) else {
                        continue;
                    };
                    if matches!(transition, Transition::CodeReady(_)) {
                        stage_started = Instant::now();
                    }
                    if matches!(transition, Transition::Confirmed(_)) {
                        confirmed_at = Some(Instant::now());
                    }
                    self.publish(transition, started);
                }
                Step::Event(Some(ProcessEvent::Stdout(line))) => {
                    tracing::debug!("tool (stdout): {}", line);
                }
                Step::Event(Some(ProcessEvent::Exited(info))) => {
                    if let Some(t) = self.session.fail(FailureReason::Exited(info.to_string())) {
                        self.publish(t, started);
                    } else {
                        tracing::debug!("tool exited after confirmation: {}", info);
                    }
                    break;
                }
                Step::Event(None) => {
                    if let Some(t) = self
                        .session
                        .fail(FailureReason::Exited("output closed".to_string()))
                    {
                        self.publish(t, started);
                    }
                    break;
                }
                Step::TimedOut(stage) => {
                    if confirmed_at.is_some() {
                        tracing::debug!("tool still running after confirmation, killing it");
                    } else if let Some(t) = self.session.fail(FailureReason::TimedOut(stage)) {
                        self.publish(t, started);
                    }
                    self.process.kill();
                    break;
                }
                Step::Cancelled => {
                    if let Some(t) = self.session.fail(FailureReason::Cancelled) {
                        self.publish(t, started);
                    }
                    self.process.kill();
                    break;
                }
                Step::Abandoned => {
                    tracing::debug!("send abandoned, killing tool");
                    self.session.fail(FailureReason::Cancelled);
                    self.process.kill();
                    break;
                }
            }
        }
    }

    fn timeout_for(&self, stage: Stage) -> Option<Duration> {
        match stage {
            Stage::Code => self.code_timeout,
            Stage::Confirmation => self.confirm_timeout,
        }
    }

    /// Publish progress, then resolve stages for one transition.
    ///
    /// Progress goes first so a caller woken by a stage result always sees
    /// the matching snapshot.
    fn publish(&mut self, transition: Transition, started: Instant) {
        self.progress_tx
            .send_replace(TransferProgress::from_session(&self.session));

        match transition {
            Transition::CodeReady(code) => {
                tracing::info!("wormhole code is {}", code);
                if let Some(tx) = self.code_tx.take() {
                    let _ = tx.send(Ok(code));
                }
            }
            Transition::ReceiverObserved(receiver) => {
                tracing::info!("receiver connected {}", receiver);
            }
            Transition::Progress(pct) => {
                tracing::trace!("progress {}%", pct);
            }
            Transition::Confirmed(receiver) => {
                tracing::info!("transfer confirmed by {:?}", receiver);
                if let (Some(tx), Some(code)) = (self.done_tx.take(), self.session.code()) {
                    let _ = tx.send(Ok(TransferReceipt {
                        code: code.clone(),
                        receiver,
                        elapsed: started.elapsed(),
                    }));
                }
            }
            Transition::Failed { stage, reason } => {
                tracing::warn!("send failed waiting for {}: {:?}", stage, reason);
                self.resolve_failure(stage, &reason);
            }
        }
    }

    fn resolve_failure(&mut self, stage: Stage, reason: &FailureReason) {
        let after = match reason {
            FailureReason::TimedOut(timed_out) => {
                self.timeout_for(*timed_out).unwrap_or_default()
            }
            _ => Duration::ZERO,
        };
        let error = |stage: Stage| match reason {
            FailureReason::Exited(status) => match stage {
                Stage::Code => Error::ExitedBeforeCode {
                    status: status.clone(),
                },
                Stage::Confirmation => Error::ExitedBeforeConfirmation {
                    status: status.clone(),
                },
            },
            FailureReason::TimedOut(timed_out) => Error::Timeout {
                stage: *timed_out,
                after,
            },
            FailureReason::Cancelled => Error::Cancelled,
        };

        if let Some(tx) = self.code_tx.take() {
            let _ = tx.send(Err(error(stage)));
        }
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(Err(error(stage)));
        }
    }
}

/// `start + limit`, or `None` (no deadline) when that is past what
/// `Instant` can represent.
fn deadline_after(start: Instant, limit: Duration) -> Option<Instant> {
    start.checked_add(limit)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Resolves once nobody can receive stage 2 any more.
async fn receiver_dropped<T>(tx: &mut Option<oneshot::Sender<T>>) {
    match tx {
        Some(tx) => tx.closed().await,
        None => std::future::pending().await,
    }
}
