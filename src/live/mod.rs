//! Live, turn-taking voice conversation
//!
//! The [`TurnController`] is a synchronous state machine: it consumes one
//! [`LiveEvent`] at a time, drives the devices directly, and returns the
//! [`Action`]s that need async work (assistant calls, timers, persistence).
//! [`LiveConversation`] owns the controller and performs those actions on a
//! tokio runtime.

use crate::assistant::{AssistantError, AssistantReply, ImageAttachment, UserTurn};
use crate::session::Message;
use std::time::Duration;
use tokio::sync::mpsc;

pub mod console;
pub mod controller;
pub mod devices;
pub mod driver;
pub mod state;

pub use controller::{ControllerSettings, TurnController};
pub use devices::{SpeechSink, TranscriptionErrorKind, TranscriptionSource};
pub use driver::LiveConversation;
pub use state::LiveState;

/// Sending half of a conversation's event channel
pub type LiveEventSender = mpsc::UnboundedSender<LiveEvent>;

/// Receiving half of a conversation's event channel
pub type LiveEventReceiver = mpsc::UnboundedReceiver<LiveEvent>;

/// Create the event channel shared by the driver and its devices
pub fn event_channel() -> (LiveEventSender, LiveEventReceiver) {
    mpsc::unbounded_channel()
}

/// Something the controller must react to
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Recognized text; interim fragments are replaced by later ones
    Fragment {
        /// Recognized text so far
        text: String,
        /// Whether the utterance is complete
        is_final: bool,
    },
    /// The transcription source ended on its own
    TranscriptionEnded,
    /// The transcription source failed
    TranscriptionError(TranscriptionErrorKind),
    /// Speech output began
    SpeechStarted,
    /// Speech output finished
    SpeechEnded,
    /// Speech output failed or was interrupted
    SpeechError(String),
    /// The assistant call for `ticket` finished
    ReplyReceived {
        /// Ticket of the dispatched turn
        ticket: u64,
        /// Outcome of the call
        result: Result<AssistantReply, AssistantError>,
    },
    /// A scheduled capture restart is due
    CaptureRestartDue {
        /// Restart epoch current when the timer was armed
        epoch: u64,
    },
    /// The user toggled speech output
    ToggleMute,
    /// The user attached an image for the next utterance
    AttachImage(ImageAttachment),
    /// The user ended the conversation
    Stop,
}

/// A turn ready to be sent to the assistant
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Ticket the reply must carry back
    pub ticket: u64,
    /// The user's turn
    pub turn: UserTurn,
    /// Session to continue
    pub session_id: Option<String>,
    /// Reply language
    pub language: Option<String>,
}

/// Async work requested by the controller
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a turn to the assistant and post the reply back
    Dispatch(TurnRequest),
    /// Post `event` after `delay`
    Schedule {
        /// How long to wait
        delay: Duration,
        /// Event to post
        event: LiveEvent,
    },
    /// Persist a completed turn
    RecordTurn {
        /// Local session id to merge into `session_id` first, when the service
        /// confirmed a different identifier
        renamed_from: Option<String>,
        /// Server-confirmed session id
        session_id: String,
        /// The user's message
        user: Message,
        /// The assistant's reply
        assistant: Message,
    },
    /// Show a non-fatal message to the user
    Notice(String),
}
