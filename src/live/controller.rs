//! Turn-taking state machine for live voice conversations

use crate::assistant::{AssistantError, AssistantReply, ImageAttachment, UserTurn};
use crate::config::LiveConfig;
use crate::error::{ParleyError, Result};
use crate::live::{
    Action, LiveEvent, LiveState, SpeechSink, TranscriptionErrorKind, TranscriptionSource,
    TurnRequest,
};
use crate::session::{new_session_id, Message};
use std::time::Duration;

/// Tunables of a [`TurnController`]
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Whether speech recognition exists on this platform
    pub speech_recognition_available: bool,
    /// Locale handed to the speech sink
    pub locale: String,
    /// Reply language sent with every turn
    pub language: Option<String>,
    /// Delay before capture restarts after the source ends on its own
    pub capture_restart_delay: Duration,
    /// Delay before capture restarts after speech output finishes
    pub post_speech_delay: Duration,
    /// Phrase spoken when the assistant call fails
    pub apology: String,
}

impl ControllerSettings {
    /// Build settings from the `live` config section
    ///
    /// `language` overrides the configured language name when given.
    pub fn from_config(config: &LiveConfig, language: Option<String>) -> Self {
        Self {
            speech_recognition_available: config.speech_recognition_available,
            locale: config.locale.clone(),
            language: language.or_else(|| Some(config.language_name.clone())),
            capture_restart_delay: Duration::from_millis(config.capture_restart_delay_ms),
            post_speech_delay: Duration::from_millis(config.post_speech_delay_ms),
            apology: config.apology.clone(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default(), None)
    }
}

// The user message is built at dispatch so its timestamp is the moment the
// utterance was finalized.
#[derive(Debug)]
struct InFlight {
    ticket: u64,
    session_id: String,
    user: Message,
    image_data_url: Option<String>,
}

/// Coordinates capture, the assistant call, and playback
///
/// # Examples
///
/// ```
/// use parley::live::{
///     ControllerSettings, LiveEvent, LiveState, SpeechSink, TranscriptionSource, TurnController,
/// };
///
/// struct Mic;
/// impl TranscriptionSource for Mic {
///     fn start(&mut self) -> parley::error::Result<()> { Ok(()) }
///     fn stop(&mut self) {}
/// }
///
/// struct Speaker;
/// impl SpeechSink for Speaker {
///     fn speak(&mut self, _text: &str, _locale: &str) -> parley::error::Result<()> { Ok(()) }
///     fn cancel(&mut self) {}
/// }
///
/// let mut controller = TurnController::new(Mic, Speaker, ControllerSettings::default());
/// controller.start().unwrap();
/// assert_eq!(controller.state(), LiveState::Listening);
///
/// controller.handle(LiveEvent::Fragment { text: "hello".into(), is_final: true });
/// assert_eq!(controller.state(), LiveState::Processing);
/// ```
pub struct TurnController<T, S> {
    source: T,
    sink: S,
    settings: ControllerSettings,
    state: LiveState,
    transcript: String,
    muted: bool,
    pending_image: Option<ImageAttachment>,
    session_id: Option<String>,
    last_error: Option<String>,
    next_ticket: u64,
    in_flight: Option<InFlight>,
    restart_epoch: u64,
}

impl<T: TranscriptionSource, S: SpeechSink> TurnController<T, S> {
    /// Create an idle controller
    pub fn new(source: T, sink: S, settings: ControllerSettings) -> Self {
        Self {
            source,
            sink,
            settings,
            state: LiveState::Idle,
            transcript: String::new(),
            muted: false,
            pending_image: None,
            session_id: None,
            last_error: None,
            next_ticket: 0,
            in_flight: None,
            restart_epoch: 0,
        }
    }

    /// Continue an existing session instead of allocating a new one
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Current state
    pub fn state(&self) -> LiveState {
        self.state
    }

    /// Latest recognized text of the current utterance
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Current session identifier, once one exists
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether speech output is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Latest error shown to the user
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an image waits for the next utterance
    pub fn has_pending_image(&self) -> bool {
        self.pending_image.is_some()
    }

    /// The transcription source
    pub fn source(&self) -> &T {
        &self.source
    }

    /// The speech sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Begin a live conversation
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Unsupported` when speech recognition is not
    /// available, or the source's error when it cannot start. The controller
    /// stays `Idle` in both cases.
    pub fn start(&mut self) -> Result<Vec<Action>> {
        if !self.settings.speech_recognition_available {
            return Err(ParleyError::Unsupported(
                "Speech recognition is not available on this device".to_string(),
            )
            .into());
        }

        if self.state.is_live() {
            return Ok(Vec::new());
        }

        self.transcript.clear();
        self.last_error = None;
        self.state = LiveState::Listening;
        self.restart_epoch += 1;

        if let Err(e) = self.source.start() {
            self.state = LiveState::Idle;
            return Err(e);
        }

        tracing::info!("Live conversation started");
        Ok(Vec::new())
    }

    /// End the conversation from any state
    pub fn stop(&mut self) -> Vec<Action> {
        self.sink.cancel();
        self.source.stop();

        self.state = LiveState::Idle;
        self.transcript.clear();
        self.pending_image = None;
        self.muted = false;
        self.in_flight = None;
        self.restart_epoch += 1;

        tracing::info!("Live conversation stopped");
        Vec::new()
    }

    /// Flip speech output on or off
    ///
    /// Muting while speaking cuts the speech off and goes back to listening.
    pub fn toggle_mute(&mut self) -> Vec<Action> {
        self.muted = !self.muted;
        tracing::debug!("Speech output muted: {}", self.muted);

        if self.muted && self.state == LiveState::Speaking {
            self.sink.cancel();
            self.state = LiveState::Listening;
            return vec![self.schedule_restart(self.settings.post_speech_delay)];
        }

        Vec::new()
    }

    /// Attach an image to the next finalized utterance
    pub fn attach_image(&mut self, image: ImageAttachment) {
        tracing::debug!("Image attached: {}", image.file_name);
        self.pending_image = Some(image);
    }

    /// React to one event
    pub fn handle(&mut self, event: LiveEvent) -> Vec<Action> {
        match event {
            LiveEvent::Fragment { text, is_final } => self.on_fragment(text, is_final),
            LiveEvent::TranscriptionEnded => self.on_transcription_ended(),
            LiveEvent::TranscriptionError(kind) => self.on_transcription_error(kind),
            LiveEvent::SpeechStarted => Vec::new(),
            LiveEvent::SpeechEnded => self.on_speech_finished(),
            LiveEvent::SpeechError(e) => {
                tracing::debug!("Speech output error treated as completion: {}", e);
                self.on_speech_finished()
            }
            LiveEvent::ReplyReceived { ticket, result } => self.on_reply(ticket, result),
            LiveEvent::CaptureRestartDue { epoch } => self.on_restart_due(epoch),
            LiveEvent::ToggleMute => self.toggle_mute(),
            LiveEvent::AttachImage(image) => {
                self.attach_image(image);
                Vec::new()
            }
            LiveEvent::Stop => self.stop(),
        }
    }

    fn on_fragment(&mut self, text: String, is_final: bool) -> Vec<Action> {
        if self.state != LiveState::Listening {
            if is_final {
                tracing::debug!("Discarding final fragment while {}", self.state);
            }
            return Vec::new();
        }

        if !is_final {
            self.transcript = text;
            return Vec::new();
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return Vec::new();
        }

        self.transcript = text.clone();
        self.state = LiveState::Processing;
        self.restart_epoch += 1;
        self.source.stop();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let session_id = self.session_id.get_or_insert_with(new_session_id).clone();

        let (turn, image_data_url) = match self.pending_image.take() {
            Some(image) => {
                let data_url = image.data_url();
                (
                    UserTurn::Image {
                        image,
                        question: text,
                    },
                    Some(data_url),
                )
            }
            None => (UserTurn::Voice(text), None),
        };

        self.in_flight = Some(InFlight {
            ticket,
            session_id: session_id.clone(),
            user: Message::user(turn.text(), turn.message_type()),
            image_data_url,
        });

        tracing::debug!("Dispatching turn {} for session {}", ticket, session_id);
        vec![Action::Dispatch(TurnRequest {
            ticket,
            turn,
            session_id: Some(session_id),
            language: self.settings.language.clone(),
        })]
    }

    fn on_transcription_ended(&mut self) -> Vec<Action> {
        if self.state != LiveState::Listening {
            return Vec::new();
        }
        vec![self.schedule_restart(self.settings.capture_restart_delay)]
    }

    fn on_transcription_error(&mut self, kind: TranscriptionErrorKind) -> Vec<Action> {
        match kind {
            TranscriptionErrorKind::NoSpeech | TranscriptionErrorKind::Aborted => {
                tracing::debug!("Ignoring transcription error: {:?}", kind);
                Vec::new()
            }
            TranscriptionErrorKind::Other(message) => {
                let error = ParleyError::Transcription(message);
                tracing::warn!("{}", error);
                let notice = error.to_string();
                self.last_error = Some(notice.clone());
                vec![Action::Notice(notice)]
            }
        }
    }

    fn on_speech_finished(&mut self) -> Vec<Action> {
        if self.state != LiveState::Speaking {
            return Vec::new();
        }
        self.state = LiveState::Listening;
        vec![self.schedule_restart(self.settings.post_speech_delay)]
    }

    fn on_restart_due(&mut self, epoch: u64) -> Vec<Action> {
        if epoch != self.restart_epoch || self.state != LiveState::Listening {
            tracing::trace!("Ignoring stale capture restart (epoch {})", epoch);
            return Vec::new();
        }
        self.begin_capture()
    }

    fn on_reply(
        &mut self,
        ticket: u64,
        result: std::result::Result<AssistantReply, AssistantError>,
    ) -> Vec<Action> {
        let current = self.in_flight.as_ref().map(|f| f.ticket);
        if self.state != LiveState::Processing || current != Some(ticket) {
            tracing::debug!("Discarding stale reply for turn {}", ticket);
            return Vec::new();
        }
        let Some(in_flight) = self.in_flight.take() else {
            return Vec::new();
        };
        self.transcript.clear();

        let mut actions = Vec::new();
        let spoken = match result {
            Ok(reply) => {
                let message_type = in_flight.user.message_type;
                let mut user = in_flight.user;
                if let Some(url) = reply.image_url.clone().or(in_flight.image_data_url) {
                    user = user.with_image_url(url);
                }
                let assistant = Message::assistant(reply.response.clone(), message_type);

                let renamed_from =
                    (reply.session_id != in_flight.session_id).then_some(in_flight.session_id);
                self.session_id = Some(reply.session_id.clone());

                actions.push(Action::RecordTurn {
                    renamed_from,
                    session_id: reply.session_id,
                    user,
                    assistant,
                });
                reply.response
            }
            Err(e) => {
                tracing::error!("Assistant request failed: {}", e);
                let notice = e.to_string();
                self.last_error = Some(notice.clone());
                actions.push(Action::Notice(notice));
                self.settings.apology.clone()
            }
        };

        if self.muted {
            self.state = LiveState::Listening;
            actions.extend(self.begin_capture());
            return actions;
        }

        self.state = LiveState::Speaking;
        if let Err(e) = self.sink.speak(&spoken, &self.settings.locale) {
            tracing::warn!("Speech output failed, resuming listening: {}", e);
            actions.extend(self.on_speech_finished());
        }
        actions
    }

    fn schedule_restart(&mut self, delay: Duration) -> Action {
        self.restart_epoch += 1;
        Action::Schedule {
            delay,
            event: LiveEvent::CaptureRestartDue {
                epoch: self.restart_epoch,
            },
        }
    }

    fn begin_capture(&mut self) -> Vec<Action> {
        self.restart_epoch += 1;
        match self.source.start() {
            Ok(()) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to restart capture: {}", e);
                let notice = e.to_string();
                self.last_error = Some(notice.clone());
                // Stay in Listening and try again after the usual delay
                let retry = self.schedule_restart(self.settings.capture_restart_delay);
                vec![Action::Notice(notice), retry]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessageType;
    use crate::test_utils::{png_attachment, RecordingSink, RecordingSource};

    type Controller = TurnController<RecordingSource, RecordingSink>;

    fn controller() -> Controller {
        TurnController::new(
            RecordingSource::default(),
            RecordingSink::default(),
            ControllerSettings::default(),
        )
    }

    fn listening() -> Controller {
        let mut c = controller();
        c.start().unwrap();
        c
    }

    fn final_fragment(text: &str) -> LiveEvent {
        LiveEvent::Fragment {
            text: text.to_string(),
            is_final: true,
        }
    }

    fn dispatched(actions: &[Action]) -> &TurnRequest {
        match actions {
            [Action::Dispatch(request)] => request,
            other => panic!("expected a single dispatch, got {:?}", other),
        }
    }

    fn reply(ticket: u64, text: &str, session: &str) -> LiveEvent {
        LiveEvent::ReplyReceived {
            ticket,
            result: Ok(AssistantReply {
                response: text.to_string(),
                session_id: session.to_string(),
                image_url: None,
            }),
        }
    }

    #[test]
    fn test_start_requires_speech_recognition() {
        let settings = ControllerSettings {
            speech_recognition_available: false,
            ..Default::default()
        };
        let mut c = TurnController::new(RecordingSource::default(), RecordingSink::default(), settings);
        let err = c.start().unwrap_err();
        assert!(err.to_string().contains("Not supported"));
        assert_eq!(c.state(), LiveState::Idle);
        assert_eq!(c.source().starts(), 0);
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let source = RecordingSource::default();
        source.fail_next_start();
        let mut c = TurnController::new(source, RecordingSink::default(), ControllerSettings::default());
        assert!(c.start().is_err());
        assert_eq!(c.state(), LiveState::Idle);
    }

    #[test]
    fn test_start_opens_source() {
        let c = listening();
        assert_eq!(c.state(), LiveState::Listening);
        assert_eq!(c.source().starts(), 1);
    }

    #[test]
    fn test_interim_fragment_updates_transcript_only() {
        let mut c = listening();
        let actions = c.handle(LiveEvent::Fragment {
            text: "hel".into(),
            is_final: false,
        });
        assert!(actions.is_empty());
        assert_eq!(c.transcript(), "hel");
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_final_fragment_dispatches_trimmed_voice_turn() {
        let mut c = listening();
        let actions = c.handle(final_fragment("  hello there  "));
        let request = dispatched(&actions);
        assert_eq!(request.turn, UserTurn::Voice("hello there".into()));
        assert_eq!(request.language.as_deref(), Some("English"));
        assert!(request.session_id.is_some());
        assert_eq!(c.state(), LiveState::Processing);
        assert_eq!(c.source().stops(), 1);
    }

    #[test]
    fn test_blank_final_fragment_is_ignored() {
        let mut c = listening();
        assert!(c.handle(final_fragment("   ")).is_empty());
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_final_fragment_during_processing_is_discarded() {
        let mut c = listening();
        c.handle(final_fragment("first"));
        let actions = c.handle(final_fragment("second"));
        assert!(actions.is_empty());
        assert_eq!(c.state(), LiveState::Processing);
        assert_eq!(c.transcript(), "first");
    }

    #[test]
    fn test_reply_while_unmuted_speaks() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hello there"))).ticket;
        let actions = c.handle(reply(ticket, "Hi!", "abc123"));

        assert_eq!(c.state(), LiveState::Speaking);
        assert_eq!(c.sink().spoken(), vec!["Hi!".to_string()]);
        assert_eq!(c.session_id(), Some("abc123"));
        assert!(matches!(
            actions.as_slice(),
            [Action::RecordTurn { session_id, user, assistant, .. }]
                if session_id == "abc123"
                    && user.content == "hello there"
                    && user.message_type == MessageType::Voice
                    && assistant.content == "Hi!"
                    && assistant.message_type == MessageType::Voice
        ));
    }

    #[test]
    fn test_reply_with_new_session_id_reports_rename() {
        let mut c = listening().with_session("local-1");
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        let actions = c.handle(reply(ticket, "Hello", "server-9"));
        assert!(matches!(
            actions.as_slice(),
            [Action::RecordTurn { renamed_from: Some(from), .. }] if from == "local-1"
        ));
    }

    #[test]
    fn test_reply_with_same_session_id_has_no_rename() {
        let mut c = listening().with_session("abc123");
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        let actions = c.handle(reply(ticket, "Hello", "abc123"));
        assert!(matches!(
            actions.as_slice(),
            [Action::RecordTurn { renamed_from: None, .. }]
        ));
    }

    #[test]
    fn test_reply_while_muted_resumes_listening_immediately() {
        let mut c = listening();
        c.toggle_mute();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        let actions = c.handle(reply(ticket, "Hello", "abc123"));

        assert_eq!(c.state(), LiveState::Listening);
        assert!(c.sink().spoken().is_empty());
        assert_eq!(c.source().starts(), 2);
        assert!(matches!(actions.as_slice(), [Action::RecordTurn { .. }]));
    }

    #[test]
    fn test_speech_end_schedules_restart_after_post_speech_delay() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(reply(ticket, "Hello", "abc123"));

        let actions = c.handle(LiveEvent::SpeechEnded);
        assert_eq!(c.state(), LiveState::Listening);
        let (delay, epoch) = match actions.as_slice() {
            [Action::Schedule {
                delay,
                event: LiveEvent::CaptureRestartDue { epoch },
            }] => (*delay, *epoch),
            other => panic!("expected a scheduled restart, got {:?}", other),
        };
        assert_eq!(delay, Duration::from_millis(200));

        assert_eq!(c.source().starts(), 1);
        c.handle(LiveEvent::CaptureRestartDue { epoch });
        assert_eq!(c.source().starts(), 2);
    }

    #[test]
    fn test_speech_error_counts_as_completion() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(reply(ticket, "Hello", "abc123"));
        c.handle(LiveEvent::SpeechError("synthesis-failed".into()));
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_mute_while_speaking_cancels_once_and_listens() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(reply(ticket, "A long answer", "abc123"));
        assert_eq!(c.state(), LiveState::Speaking);

        let actions = c.toggle_mute();
        assert!(c.is_muted());
        assert_eq!(c.state(), LiveState::Listening);
        assert_eq!(c.sink().cancels(), 1);
        assert!(matches!(actions.as_slice(), [Action::Schedule { .. }]));

        // The interrupted utterance reports an error afterwards; nothing changes.
        assert!(c.handle(LiveEvent::SpeechError("interrupted".into())).is_empty());
        assert_eq!(c.sink().cancels(), 1);
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_mute_outside_speaking_does_not_cancel() {
        let mut c = listening();
        assert!(c.toggle_mute().is_empty());
        assert!(c.toggle_mute().is_empty());
        assert!(!c.is_muted());
        assert_eq!(c.sink().cancels(), 0);
    }

    #[test]
    fn test_network_error_unmuted_speaks_apology_and_records_nothing() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        let actions = c.handle(LiveEvent::ReplyReceived {
            ticket,
            result: Err(AssistantError::Network("connection refused".into())),
        });

        assert_eq!(c.state(), LiveState::Speaking);
        assert_eq!(
            c.sink().spoken(),
            vec!["Sorry, I encountered an error. Please try again.".to_string()]
        );
        assert!(c.last_error().unwrap().contains("connection refused"));
        assert!(actions
            .iter()
            .all(|a| !matches!(a, Action::RecordTurn { .. })));
        assert!(matches!(actions.as_slice(), [Action::Notice(_)]));

        c.handle(LiveEvent::SpeechEnded);
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_error_while_muted_returns_to_listening() {
        let mut c = listening();
        c.toggle_mute();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(LiveEvent::ReplyReceived {
            ticket,
            result: Err(AssistantError::Service("boom".into())),
        });
        assert_eq!(c.state(), LiveState::Listening);
        assert!(c.sink().spoken().is_empty());
    }

    #[test]
    fn test_stop_resets_everything_and_drops_late_reply() {
        let mut c = listening();
        c.toggle_mute();
        c.attach_image(png_attachment());
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;

        c.stop();
        assert_eq!(c.state(), LiveState::Idle);
        assert!(!c.is_muted());
        assert!(c.transcript().is_empty());
        assert!(!c.has_pending_image());
        assert_eq!(c.sink().cancels(), 1);

        assert!(c.handle(reply(ticket, "late", "abc123")).is_empty());
        assert_eq!(c.state(), LiveState::Idle);
    }

    #[test]
    fn test_restart_timer_after_stop_is_ignored() {
        let mut c = listening();
        let actions = c.handle(LiveEvent::TranscriptionEnded);
        let epoch = match actions.as_slice() {
            [Action::Schedule {
                event: LiveEvent::CaptureRestartDue { epoch },
                ..
            }] => *epoch,
            other => panic!("expected a scheduled restart, got {:?}", other),
        };
        c.stop();
        c.handle(LiveEvent::CaptureRestartDue { epoch });
        assert_eq!(c.source().starts(), 1);
    }

    #[test]
    fn test_source_end_during_processing_does_not_restart() {
        let mut c = listening();
        c.handle(final_fragment("hi"));
        assert!(c.handle(LiveEvent::TranscriptionEnded).is_empty());
        assert_eq!(c.source().starts(), 1);
    }

    #[test]
    fn test_image_goes_with_next_utterance_only() {
        let mut c = listening();
        c.attach_image(png_attachment());

        let actions = c.handle(final_fragment("what is this?"));
        let request = dispatched(&actions);
        assert!(matches!(&request.turn, UserTurn::Image { question, .. } if question == "what is this?"));
        assert!(!c.has_pending_image());

        let ticket = request.ticket;
        let actions = c.handle(reply(ticket, "A cat", "abc123"));
        assert!(matches!(
            actions.as_slice(),
            [Action::RecordTurn { user, assistant, .. }]
                if user.message_type == MessageType::Image
                    && user.image_url.as_deref().is_some_and(|u| u.starts_with("data:image/png"))
                    && assistant.message_type == MessageType::Image
        ));

        c.handle(LiveEvent::SpeechEnded);
        let epoch = c.restart_epoch;
        c.handle(LiveEvent::CaptureRestartDue { epoch });
        let next = c.handle(final_fragment("and now?"));
        assert_eq!(dispatched(&next).turn, UserTurn::Voice("and now?".into()));
    }

    #[test]
    fn test_transcription_errors() {
        let mut c = listening();
        assert!(c
            .handle(LiveEvent::TranscriptionError(TranscriptionErrorKind::NoSpeech))
            .is_empty());
        assert!(c
            .handle(LiveEvent::TranscriptionError(TranscriptionErrorKind::Aborted))
            .is_empty());
        assert!(c.last_error().is_none());

        let actions = c.handle(LiveEvent::TranscriptionError(TranscriptionErrorKind::Other(
            "audio-capture".into(),
        )));
        assert!(matches!(actions.as_slice(), [Action::Notice(_)]));
        assert!(c.last_error().unwrap().contains("audio-capture"));
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_at_most_one_request_in_flight() {
        let mut c = listening();
        let first = dispatched(&c.handle(final_fragment("one"))).ticket;
        c.handle(final_fragment("two"));
        c.handle(final_fragment("three"));

        // A reply for a ticket that was never issued is ignored.
        assert!(c.handle(reply(first + 1, "x", "s")).is_empty());
        assert_eq!(c.state(), LiveState::Processing);
        assert!(!c.handle(reply(first, "ok", "s")).is_empty());
    }

    fn scheduled_restart(actions: &[Action]) -> (Duration, u64) {
        match actions {
            [Action::Notice(_), Action::Schedule {
                delay,
                event: LiveEvent::CaptureRestartDue { epoch },
            }] => (*delay, *epoch),
            other => panic!("expected a notice and a retry, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_capture_restart_is_retried() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(reply(ticket, "Hello", "abc123"));
        let epoch = match c.handle(LiveEvent::SpeechEnded).as_slice() {
            [Action::Schedule {
                event: LiveEvent::CaptureRestartDue { epoch },
                ..
            }] => *epoch,
            other => panic!("expected a scheduled restart, got {:?}", other),
        };

        c.source().fail_next_start();
        let actions = c.handle(LiveEvent::CaptureRestartDue { epoch });
        let (delay, retry_epoch) = scheduled_restart(&actions);
        assert_eq!(delay, Duration::from_millis(300));
        assert_ne!(retry_epoch, epoch);
        assert_eq!(c.state(), LiveState::Listening);
        assert!(c.last_error().unwrap().contains("microphone unavailable"));
        assert_eq!(c.source().starts(), 1);

        // The old timer is stale; the retry opens the source again
        assert!(c.handle(LiveEvent::CaptureRestartDue { epoch }).is_empty());
        assert!(c
            .handle(LiveEvent::CaptureRestartDue { epoch: retry_epoch })
            .is_empty());
        assert_eq!(c.source().starts(), 2);
        assert_eq!(c.state(), LiveState::Listening);
    }

    #[test]
    fn test_failed_restart_after_muted_reply_is_retried() {
        let mut c = listening();
        c.toggle_mute();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;

        c.source().fail_next_start();
        let actions = c.handle(reply(ticket, "Hello", "abc123"));
        assert!(matches!(actions.first(), Some(Action::RecordTurn { .. })));
        let (_, retry_epoch) = scheduled_restart(&actions[1..]);
        assert_eq!(c.state(), LiveState::Listening);
        assert_eq!(c.source().starts(), 1);

        c.handle(LiveEvent::CaptureRestartDue { epoch: retry_epoch });
        assert_eq!(c.source().starts(), 2);
    }

    #[test]
    fn test_stop_while_speaking_cancels_and_goes_idle() {
        let mut c = listening();
        let ticket = dispatched(&c.handle(final_fragment("hi"))).ticket;
        c.handle(reply(ticket, "A long answer", "abc123"));
        assert_eq!(c.state(), LiveState::Speaking);

        let actions = c.handle(LiveEvent::Stop);
        assert!(actions.is_empty());
        assert_eq!(c.state(), LiveState::Idle);
        assert_eq!(c.sink().cancels(), 1);
        assert_eq!(c.source().stops(), 1);

        // The cancelled utterance still reports back; nothing restarts
        assert!(c.handle(LiveEvent::SpeechEnded).is_empty());
        assert!(c.handle(LiveEvent::SpeechError("interrupted".into())).is_empty());
        assert_eq!(c.state(), LiveState::Idle);
        assert_eq!(c.source().starts(), 1);
    }
}
