//! Send state machine.
//!
//! A send moves through
//! `Started → CodeCaptured → ReceiverObserved → Confirmed`, driven purely by
//! [`ToolEvent`]s in the order the tool prints them. `Failed` is the
//! terminal error state entered when the process exits early, a timeout
//! fires, or the user cancels.
//!
//! `ReceiverObserved` may be skipped: the tool can confirm without ever
//! naming the peer, in which case the receiver is reported as `""`.

use std::fmt;

use crate::parser::{ExchangeCode, ToolEvent};

/// State of a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Process started, no code yet
    Started,
    /// Exchange code printed
    CodeCaptured,
    /// A receiver connected
    ReceiverObserved,
    /// Receiver confirmed the transfer
    Confirmed,
    /// Send failed before confirmation
    Failed,
}

impl SendState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::CodeCaptured => "code captured",
            Self::ReceiverObserved => "receiver observed",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One of the two asynchronous results of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the exchange code
    Code,
    /// Waiting for the receiver's confirmation
    Confirmation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => f.write_str("the exchange code"),
            Self::Confirmation => f.write_str("the receiver to confirm"),
        }
    }
}

/// Why a send ended in [`SendState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The process exited; carries a description of its exit status
    Exited(String),
    /// A stage did not complete in time
    TimedOut(Stage),
    /// The send was cancelled
    Cancelled,
}

/// What changed after feeding an event or failure into a [`SendSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Stage 1 resolved
    CodeReady(ExchangeCode),
    /// A receiver descriptor was captured
    ReceiverObserved(String),
    /// Progress bar moved
    Progress(u8),
    /// Stage 2 resolved with the last captured receiver, or `""`
    Confirmed(String),
    /// The send failed; carries the stage that was pending
    Failed {
        /// Stage that was pending
        stage: Stage,
        /// Cause of the failure
        reason: FailureReason,
    },
}

/// Finite-state tracker for one invocation of the tool.
#[derive(Debug, Clone)]
pub struct SendSession {
    state: SendState,
    code: Option<ExchangeCode>,
    receiver: Option<String>,
    progress: Option<u8>,
}

impl Default for SendSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SendSession {
    /// Create a session in [`SendState::Started`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SendState::Started,
            code: None,
            receiver: None,
            progress: None,
        }
    }

    /// Current state.
    pub const fn state(&self) -> SendState {
        self.state
    }

    /// The captured exchange code, if any.
    pub const fn code(&self) -> Option<&ExchangeCode> {
        self.code.as_ref()
    }

    /// The last captured receiver descriptor, if any.
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    /// Last progress percentage reported by the tool.
    pub const fn progress(&self) -> Option<u8> {
        self.progress
    }

    /// Whether no further transitions are possible.
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The stage currently pending.
    pub const fn pending_stage(&self) -> Stage {
        match self.state {
            SendState::Started => Stage::Code,
            _ => Stage::Confirmation,
        }
    }

    /// Feed one parsed event.
    ///
    /// Returns the resulting transition, or `None` when the event changes
    /// nothing: a repeated code, a sending line without a receiver, a
    /// confirmation before any code, or anything after a terminal state.
    pub fn apply(&mut self, event: ToolEvent) -> Option<Transition> {
        if self.is_terminal() {
            return None;
        }

        match event {
            ToolEvent::Code(code) => {
                if self.state != SendState::Started {
                    tracing::debug!("ignoring repeated code line");
                    return None;
                }
                self.state = SendState::CodeCaptured;
                self.code = Some(code.clone());
                Some(Transition::CodeReady(code))
            }
            ToolEvent::Sending { receiver: None } => None,
            ToolEvent::Sending {
                receiver: Some(receiver),
            } => {
                if self.state == SendState::CodeCaptured {
                    self.state = SendState::ReceiverObserved;
                }
                self.receiver = Some(receiver.clone());
                Some(Transition::ReceiverObserved(receiver))
            }
            ToolEvent::Progress(pct) => {
                self.progress = Some(pct);
                Some(Transition::Progress(pct))
            }
            ToolEvent::Confirmed => {
                if self.state == SendState::Started {
                    tracing::debug!("ignoring confirmation before any code");
                    return None;
                }
                self.state = SendState::Confirmed;
                Some(Transition::Confirmed(
                    self.receiver.clone().unwrap_or_default(),
                ))
            }
        }
    }

    /// Move to [`SendState::Failed`]. No-op on a terminal session.
    pub fn fail(&mut self, reason: FailureReason) -> Option<Transition> {
        if self.is_terminal() {
            return None;
        }
        let stage = self.pending_stage();
        self.state = SendState::Failed;
        Some(Transition::Failed { stage, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn feed(session: &mut SendSession, line: &str) -> Option<Transition> {
        parse_line(line).and_then(|event| session.apply(event))
    }

    #[test]
    fn test_full_run() {
        let mut session = SendSession::new();
        assert_eq!(session.state(), SendState::Started);

        assert_eq!(feed(&mut session, "Sending 7 Bytes file named 'a.txt'"), None);
        assert_eq!(session.state(), SendState::Started);

        let t = feed(&mut session, "Wormhole code is: 7-crossover-clockwork");
        assert_eq!(
            t,
            Some(Transition::CodeReady(
                ExchangeCode::new("7-crossover-clockwork").unwrap()
            ))
        );
        assert_eq!(session.state(), SendState::CodeCaptured);

        let t = feed(&mut session, "Sending (<-192.168.1.5:4321)");
        assert_eq!(
            t,
            Some(Transition::ReceiverObserved("(<-192.168.1.5:4321)".into()))
        );
        assert_eq!(session.state(), SendState::ReceiverObserved);

        let t = feed(&mut session, "Confirmation received");
        assert_eq!(t, Some(Transition::Confirmed("(<-192.168.1.5:4321)".into())));
        assert_eq!(session.state(), SendState::Confirmed);
        assert!(session.is_terminal());
    }

    #[test]
    fn test_confirmation_without_receiver_is_empty() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        let t = feed(&mut session, "Confirmation received");
        assert_eq!(t, Some(Transition::Confirmed(String::new())));
    }

    #[test]
    fn test_last_receiver_wins() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        feed(&mut session, "Sending (<-10.0.0.1:1)");
        feed(&mut session, "Sending (<-10.0.0.2:2)");
        assert_eq!(session.state(), SendState::ReceiverObserved);
        let t = feed(&mut session, "Confirmation received");
        assert_eq!(t, Some(Transition::Confirmed("(<-10.0.0.2:2)".into())));
    }

    #[test]
    fn test_sending_line_without_receiver_keeps_previous() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        feed(&mut session, "Sending (<-10.0.0.1:1)");
        assert_eq!(feed(&mut session, "Sending 7 Bytes file named 'notes.txt'"), None);
        assert_eq!(session.receiver(), Some("(<-10.0.0.1:1)"));
        assert_eq!(session.state(), SendState::ReceiverObserved);

        let t = feed(&mut session, "Confirmation received");
        assert_eq!(t, Some(Transition::Confirmed("(<-10.0.0.1:1)".into())));
    }

    #[test]
    fn test_unrelated_lines_do_not_transition() {
        let mut session = SendSession::new();
        for line in [
            "On the other computer, please run:",
            "wormhole receive 7-a-b",
            "File sent.. waiting for confirmation",
        ] {
            assert_eq!(feed(&mut session, line), None);
            assert_eq!(session.state(), SendState::Started);
        }
    }

    #[test]
    fn test_confirmation_before_code_is_ignored() {
        let mut session = SendSession::new();
        assert_eq!(feed(&mut session, "Confirmation received"), None);
        assert_eq!(session.state(), SendState::Started);
    }

    #[test]
    fn test_second_code_is_ignored() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 1-first-code");
        assert_eq!(feed(&mut session, "Wormhole code is: 2-second-code"), None);
        assert_eq!(session.code().unwrap().as_str(), "1-first-code");
    }

    #[test]
    fn test_progress_tracked_without_state_change() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        assert_eq!(
            feed(&mut session, " 42%|####      | 4.2k/10k"),
            Some(Transition::Progress(42))
        );
        assert_eq!(session.state(), SendState::CodeCaptured);
        assert_eq!(session.progress(), Some(42));
    }

    #[test]
    fn test_fail_records_pending_stage() {
        let mut session = SendSession::new();
        let t = session.fail(FailureReason::Exited("exit status: 1".into()));
        assert_eq!(
            t,
            Some(Transition::Failed {
                stage: Stage::Code,
                reason: FailureReason::Exited("exit status: 1".into()),
            })
        );
        assert_eq!(session.state(), SendState::Failed);

        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        let t = session.fail(FailureReason::TimedOut(Stage::Confirmation));
        assert!(matches!(
            t,
            Some(Transition::Failed {
                stage: Stage::Confirmation,
                ..
            })
        ));
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let mut session = SendSession::new();
        feed(&mut session, "Wormhole code is: 3-a-b");
        feed(&mut session, "Confirmation received");
        assert_eq!(session.fail(FailureReason::Cancelled), None);
        assert_eq!(feed(&mut session, "Sending (<-1.1.1.1:1)"), None);
        assert_eq!(session.state(), SendState::Confirmed);

        let mut session = SendSession::new();
        session.fail(FailureReason::Cancelled);
        assert_eq!(feed(&mut session, "Wormhole code is: 3-a-b"), None);
        assert_eq!(session.state(), SendState::Failed);
    }
}
