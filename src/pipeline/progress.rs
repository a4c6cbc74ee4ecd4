//! Pure progress-channel state machine.
//!
//! [`reduce`] maps `(state, input)` to `(state', effects)` and does nothing
//! else: no I/O, no clock, no logging. The WebSocket driver in
//! [`super::channel`] feeds it transport inputs and executes the effects,
//! which keeps every transition testable without a server.
//!
//! ```text
//!            event(0..=99, …)        event(100, url)
//!          ┌──────────────┐       ┌──────────────────▶ Complete
//!          ▼              │       │
//!       Running ──────────┴───────┤ event(-1, msg)
//!                                 ├──────────────────▶ Failed(Job)
//!                                 │ lost / closed
//!                                 └──────────────────▶ Failed(Connection)
//! ```
//!
//! Complete and Failed absorb every later input.

use crate::job::ProgressEvent;
use crate::view::ProgressSnapshot;

/// Status text shown once the connection is up, before the first frame.
pub const CONNECTED_MESSAGE: &str = "Connected, waiting for processing…";

/// Reason shown for a `-1` frame without a message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "The conversion job failed on the server.";

/// Reason shown when the connection drops before a terminal frame.
pub const CONNECTION_ERROR_MESSAGE: &str = "The progress connection was lost.";

/// Why the channel ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The service sent the `-1` sentinel.
    Job { reason: String },
    /// The transport failed or closed before a terminal frame.
    Connection { reason: String },
    /// A completion frame arrived without `download_url`.
    Protocol { detail: String },
}

impl Termination {
    /// Text for the error view.
    pub fn message(&self) -> &str {
        match self {
            Termination::Job { reason } => reason,
            Termination::Connection { .. } => CONNECTION_ERROR_MESSAGE,
            Termination::Protocol { detail } => detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Running(ProgressSnapshot),
    Complete { download_url: String },
    Failed(Termination),
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState::Running(ProgressSnapshot::default())
    }
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelState::Running(_))
    }
}

/// Everything the transport can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    /// Handshake finished.
    Opened,
    /// A decoded frame.
    Event(ProgressEvent),
    /// Transport error, or the stream ended before a terminal frame.
    Lost { reason: String },
}

/// Work the driver performs after a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Redraw the progress view with this snapshot.
    Render(ProgressSnapshot),
    /// Show the result view; the artifact is at this URL (verbatim).
    Complete { download_url: String },
    /// Show the error view.
    Fail(Termination),
    /// Close the connection and stop reading.
    Close,
}

/// Advance the state machine by one input.
pub fn reduce(state: ChannelState, input: ChannelInput) -> (ChannelState, Vec<Effect>) {
    let mut snapshot = match state {
        ChannelState::Running(s) => s,
        terminal => return (terminal, Vec::new()),
    };

    match input {
        ChannelInput::Opened => {
            snapshot.message = CONNECTED_MESSAGE.to_string();
            let effects = vec![Effect::Render(snapshot.clone())];
            (ChannelState::Running(snapshot), effects)
        }

        ChannelInput::Event(ev) if ev.progress == ProgressEvent::FAILED => {
            let reason = ev
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            fail(Termination::Job { reason })
        }

        ChannelInput::Event(ev) if ev.progress == ProgressEvent::COMPLETE => {
            match ev.download_url {
                Some(download_url) => (
                    ChannelState::Complete {
                        download_url: download_url.clone(),
                    },
                    vec![Effect::Complete { download_url }, Effect::Close],
                ),
                None => fail(Termination::Protocol {
                    detail: "completion frame has no download_url".to_string(),
                }),
            }
        }

        ChannelInput::Event(ev) => {
            snapshot.progress = ev.progress;
            if let Some(message) = ev.message {
                snapshot.message = message;
            }
            // A frame without detail clears the previous detail text.
            snapshot.detail = ev.detail.unwrap_or_default();
            let effects = vec![Effect::Render(snapshot.clone())];
            (ChannelState::Running(snapshot), effects)
        }

        ChannelInput::Lost { reason } => fail(Termination::Connection { reason }),
    }
}

fn fail(t: Termination) -> (ChannelState, Vec<Effect>) {
    (
        ChannelState::Failed(t.clone()),
        vec![Effect::Fail(t), Effect::Close],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(inputs: Vec<ChannelInput>) -> (ChannelState, Vec<Effect>) {
        let mut state = ChannelState::default();
        let mut all = Vec::new();
        for input in inputs {
            let (next, effects) = reduce(state, input);
            state = next;
            all.extend(effects);
        }
        (state, all)
    }

    fn ev(p: i64) -> ChannelInput {
        ChannelInput::Event(ProgressEvent::new(p))
    }

    #[test]
    fn displayed_progress_is_most_recent_value() {
        let (state, _) = run(vec![ev(10), ev(40), ev(40), ev(25), ev(99)]);
        match state {
            ChannelState::Running(s) => assert_eq!(s.progress, 99),
            other => panic!("unexpected {other:?}"),
        }

        let (state, effects) = run(vec![ev(30), ev(30)]);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], effects[1]);
        assert!(matches!(state, ChannelState::Running(ref s) if s.progress == 30));
    }

    #[test]
    fn missing_detail_clears_previous_detail() {
        let (state, effects) = run(vec![
            ChannelInput::Event(ProgressEvent::new(55).with_detail("parsing")),
            ChannelInput::Event(ProgressEvent::new(60).with_message("Saving")),
        ]);
        let ChannelState::Running(s) = state else {
            panic!("still running expected")
        };
        assert_eq!(s.detail, "");
        assert_eq!(s.message, "Saving");
        assert_eq!(
            effects[0],
            Effect::Render(ProgressSnapshot {
                progress: 55,
                message: String::new(),
                detail: "parsing".into(),
            })
        );
    }

    #[test]
    fn missing_message_keeps_previous_message() {
        let (state, _) = run(vec![
            ChannelInput::Event(ProgressEvent::new(5).with_message("Reading file")),
            ev(7),
        ]);
        assert!(matches!(state, ChannelState::Running(ref s) if s.message == "Reading file"));
    }

    #[test]
    fn opened_sets_connected_message() {
        let (state, effects) = run(vec![ChannelInput::Opened]);
        assert!(matches!(state, ChannelState::Running(ref s) if s.message == CONNECTED_MESSAGE));
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn failure_sentinel_surfaces_message_and_closes() {
        let (state, effects) = run(vec![
            ev(10),
            ChannelInput::Event(ProgressEvent::new(-1).with_message("bad format")),
        ]);
        let t = Termination::Job {
            reason: "bad format".into(),
        };
        assert_eq!(state, ChannelState::Failed(t.clone()));
        assert_eq!(&effects[1..], &[Effect::Fail(t), Effect::Close]);
    }

    #[test]
    fn failure_without_message_uses_default_reason() {
        let (state, _) = run(vec![ev(-1)]);
        let ChannelState::Failed(t) = state else {
            panic!("failed expected")
        };
        assert_eq!(t.message(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn completion_propagates_url_verbatim() {
        let url = "/dl/abc?x=1&y=%20";
        let (state, effects) = run(vec![ChannelInput::Event(
            ProgressEvent::new(100).with_download_url(url),
        )]);
        assert_eq!(
            state,
            ChannelState::Complete {
                download_url: url.into()
            }
        );
        assert_eq!(
            effects,
            vec![
                Effect::Complete {
                    download_url: url.into()
                },
                Effect::Close
            ]
        );
    }

    #[test]
    fn completion_without_url_is_protocol_failure() {
        let (state, _) = run(vec![ev(100)]);
        assert!(matches!(
            state,
            ChannelState::Failed(Termination::Protocol { .. })
        ));
    }

    #[test]
    fn terminal_states_absorb_everything() {
        let (state, effects) = run(vec![
            ChannelInput::Event(ProgressEvent::new(-1).with_message("first")),
            ChannelInput::Event(ProgressEvent::new(100).with_download_url("/dl/x")),
            ev(50),
            ChannelInput::Lost {
                reason: "eof".into(),
            },
        ]);
        assert_eq!(
            state,
            ChannelState::Failed(Termination::Job {
                reason: "first".into()
            })
        );
        assert_eq!(effects.len(), 2);

        let (state, effects) = run(vec![
            ChannelInput::Event(ProgressEvent::new(100).with_download_url("/dl/x")),
            ChannelInput::Event(ProgressEvent::new(-1).with_message("late")),
        ]);
        assert!(matches!(state, ChannelState::Complete { .. }));
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn lost_connection_fails_with_generic_reason() {
        let (state, effects) = run(vec![
            ev(20),
            ChannelInput::Lost {
                reason: "connection reset".into(),
            },
        ]);
        let ChannelState::Failed(t) = state else {
            panic!("failed expected")
        };
        assert_eq!(t.message(), CONNECTION_ERROR_MESSAGE);
        assert_eq!(effects.last(), Some(&Effect::Close));
    }
}
