//! Async driver of a live conversation
//!
//! The driver is the single consumer of the event channel. Assistant calls
//! and restart timers run in spawned tasks and report back through the same
//! channel, so the controller only ever sees one event at a time.

use crate::assistant::AssistantClient;
use crate::error::Result;
use crate::live::{
    Action, LiveEvent, LiveEventReceiver, LiveEventSender, SpeechSink, TranscriptionSource,
    TurnController, TurnRequest,
};
use crate::session::{Message, SessionPersistence};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A running live conversation
pub struct LiveConversation<T, S> {
    controller: TurnController<T, S>,
    assistant: Arc<dyn AssistantClient>,
    persistence: SessionPersistence,
    events: LiveEventSender,
    inbox: LiveEventReceiver,
    notices: Option<mpsc::UnboundedSender<String>>,
}

impl<T: TranscriptionSource, S: SpeechSink> LiveConversation<T, S> {
    /// Wire a controller to the assistant and local persistence
    ///
    /// `events` and `inbox` are the two halves of the channel the devices
    /// were given (see [`event_channel`](crate::live::event_channel)).
    pub fn new(
        controller: TurnController<T, S>,
        assistant: Arc<dyn AssistantClient>,
        persistence: SessionPersistence,
        events: LiveEventSender,
        inbox: LiveEventReceiver,
    ) -> Self {
        Self {
            controller,
            assistant,
            persistence,
            events,
            inbox,
            notices: None,
        }
    }

    /// Forward user-facing notices to `notices`
    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<String>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Start listening and process events until the conversation stops
    ///
    /// Returns the controller in its final (`Idle`) state.
    ///
    /// # Errors
    ///
    /// Returns error if the conversation cannot start
    pub async fn run(mut self) -> Result<TurnController<T, S>> {
        let actions = self.controller.start()?;
        self.perform(actions);

        while self.controller.state().is_live() {
            let Some(event) = self.inbox.recv().await else {
                tracing::debug!("Event channel closed, stopping");
                let actions = self.controller.stop();
                self.perform(actions);
                break;
            };

            let before = self.controller.state();
            let actions = self.controller.handle(event);
            let after = self.controller.state();
            if before != after {
                tracing::debug!("Live state {} -> {}", before, after);
            }
            self.perform(actions);
        }

        Ok(self.controller)
    }

    fn perform(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Dispatch(request) => self.dispatch(request),
                Action::Schedule { delay, event } => self.schedule(delay, event),
                Action::RecordTurn {
                    renamed_from,
                    session_id,
                    user,
                    assistant,
                } => {
                    if let Err(e) = self.record(renamed_from, &session_id, user, assistant) {
                        tracing::error!("Failed to save turn for session {}: {}", session_id, e);
                        self.notify(format!("Failed to save conversation: {}", e));
                    }
                }
                Action::Notice(message) => self.notify(message),
            }
        }
    }

    fn dispatch(&self, request: TurnRequest) {
        let assistant = Arc::clone(&self.assistant);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = assistant
                .send(
                    &request.turn,
                    request.session_id.as_deref(),
                    request.language.as_deref(),
                )
                .await;
            let _ = events.send(LiveEvent::ReplyReceived {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn schedule(&self, delay: Duration, event: LiveEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }

    fn record(
        &self,
        renamed_from: Option<String>,
        session_id: &str,
        user: Message,
        assistant: Message,
    ) -> Result<()> {
        if let Some(from) = renamed_from {
            self.persistence.rename_session(&from, session_id)?;
        }
        self.persistence.record_turn(session_id, user, assistant)?;
        Ok(())
    }

    fn notify(&self, message: String) {
        tracing::info!("Notice: {}", message);
        if let Some(notices) = &self.notices {
            let _ = notices.send(message);
        }
    }
}
