//! Typed (non-live) conversations
//!
//! A [`TextConversation`] sends one turn at a time and records each
//! successful exchange locally. A failed turn records nothing.

use crate::assistant::{AssistantClient, AssistantReply, UserTurn};
use crate::error::{ParleyError, Result};
use crate::session::{new_session_id, Message, Session, SessionPersistence};
use std::sync::Arc;

/// A conversation driven by typed turns
pub struct TextConversation {
    client: Arc<dyn AssistantClient>,
    persistence: SessionPersistence,
    session_id: Option<String>,
    language: Option<String>,
}

impl TextConversation {
    /// Create a conversation, optionally continuing `session_id`
    pub fn new(
        client: Arc<dyn AssistantClient>,
        persistence: SessionPersistence,
        session_id: Option<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            client,
            persistence,
            session_id,
            language,
        }
    }

    /// Current session identifier, if any turn has been sent or resumed
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Cached messages of the current session
    pub fn session(&self) -> Result<Option<Session>> {
        match &self.session_id {
            Some(id) => Ok(Some(self.persistence.load_session(id)?)),
            None => Ok(None),
        }
    }

    /// Forget the current session; the next turn starts a new one
    pub fn reset(&mut self) {
        self.session_id = None;
    }

    /// Send a turn and record the exchange
    ///
    /// # Errors
    ///
    /// Returns the assistant failure (as `ParleyError::Network`, `Service`,
    /// or `Validation`) without touching local storage, or a storage error
    /// if the exchange cannot be recorded.
    pub async fn send(&mut self, turn: UserTurn) -> Result<AssistantReply> {
        let session_id = self
            .session_id
            .get_or_insert_with(new_session_id)
            .clone();

        let mut user = Message::user(turn.text().trim(), turn.message_type());
        let reply = self
            .client
            .send(&turn, Some(&session_id), self.language.as_deref())
            .await
            .map_err(ParleyError::from)?;

        if let Some(url) = reply
            .image_url
            .clone()
            .or_else(|| turn.image().map(|i| i.data_url()))
        {
            user = user.with_image_url(url);
        }
        let assistant = Message::assistant(reply.response.clone(), turn.message_type());

        if reply.session_id != session_id {
            self.persistence
                .rename_session(&session_id, &reply.session_id)?;
        }
        self.persistence
            .record_turn(&reply.session_id, user, assistant)?;
        self.session_id = Some(reply.session_id.clone());

        Ok(reply)
    }
}
