//! Write-through persistence of sessions and the history index
//!
//! Every change re-serializes the full message list of the session and
//! recomputes its history entry. This suits chat-sized histories; it is
//! not meant for very long conversations.
//!
//! The remote session log kept by the relay is never reconciled with this
//! local store. Deleting or clearing here leaves remote records orphaned.

use crate::error::{ParleyError, Result};
use crate::session::history::{self, HistoryEntry};
use crate::session::{KeyValueStore, Message, Session};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Key prefix of per-session message caches
pub const SESSION_KEY_PREFIX: &str = "chat_";

/// Key of the history index
pub const HISTORY_KEY: &str = "chatHistory";

/// Storage key of the message cache for `session_id`
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}

/// Local session persistence and history index maintenance
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use parley::session::{MemoryKeyValueStore, Message, MessageType, SessionPersistence};
///
/// # fn main() -> parley::error::Result<()> {
/// let persistence = SessionPersistence::new(Arc::new(MemoryKeyValueStore::new()));
/// let session = persistence.record_turn(
///     "abc123",
///     Message::user("hello there", MessageType::Voice),
///     Message::assistant("Hi!", MessageType::Voice),
/// )?;
/// assert_eq!(session.len(), 2);
/// assert_eq!(persistence.history()?[0].title, "hello there");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl SessionPersistence {
    /// Create a persistence layer over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Append a completed (user, assistant) pair to a session
    ///
    /// Both messages are appended in that order, the full list is written
    /// back, and the session's history entry is recomputed.
    pub fn record_turn(&self, session_id: &str, user: Message, assistant: Message) -> Result<Session> {
        let mut messages = self.read_messages(session_id)?;
        messages.push(user);
        messages.push(assistant);
        self.write_session(session_id, &messages)?;

        tracing::debug!(
            "Recorded turn for session {} ({} messages)",
            session_id,
            messages.len()
        );

        Ok(Session::from_messages(session_id, messages))
    }

    /// Move a session's cached messages to a server-confirmed identifier
    ///
    /// Messages already cached under `to` are kept after those moved from
    /// `from`. The old cache key and history entry are removed.
    pub fn rename_session(&self, from: &str, to: &str) -> Result<Session> {
        if from == to {
            return self.load_session(to);
        }

        let mut messages = self.read_messages(from)?;
        if messages.is_empty() {
            return self.load_session(to);
        }
        messages.extend(self.read_messages(to)?);

        self.store.remove(&session_key(from))?;
        let mut index = self.history()?;
        history::remove_entry(&mut index, from);
        self.write_index(&index)?;
        self.write_session(to, &messages)?;

        tracing::info!("Session {} adopted server identifier {}", from, to);
        Ok(Session::from_messages(to, messages))
    }

    /// Load a session's messages from the local cache
    ///
    /// A missing or corrupt cache yields an empty session; the corrupt entry
    /// is dropped.
    pub fn load_session(&self, session_id: &str) -> Result<Session> {
        let messages = self.read_messages(session_id)?;
        if messages.is_empty() {
            return Ok(Session::empty(session_id));
        }
        Ok(Session::from_messages(session_id, messages))
    }

    /// Remove a session's cache and history entry
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.store.remove(&session_key(session_id))?;

        let mut index = self.history()?;
        if history::remove_entry(&mut index, session_id) {
            self.write_index(&index)?;
        }

        tracing::info!("Deleted local session {}", session_id);
        Ok(())
    }

    /// Remove every history entry and every cached session
    pub fn clear_all(&self) -> Result<()> {
        let keys = self.store.keys_with_prefix(SESSION_KEY_PREFIX)?;
        for key in &keys {
            self.store.remove(key)?;
        }
        self.store.remove(HISTORY_KEY)?;

        tracing::info!("Cleared local history ({} sessions)", keys.len());
        Ok(())
    }

    /// The history index, most recently updated first
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.read_json(HISTORY_KEY)?.unwrap_or_default())
    }

    /// History entries whose title or preview contains `term`
    pub fn search(&self, term: &str) -> Result<Vec<HistoryEntry>> {
        Ok(history::search_entries(&self.history()?, term))
    }

    fn read_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self.read_json(&session_key(session_id))?.unwrap_or_default())
    }

    fn write_session(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string(messages)?;
        self.store.set(&session_key(session_id), &json)?;

        let mut index = self.history()?;
        match history::derive_entry(session_id, messages, Utc::now()) {
            Some(entry) => history::upsert_entry(&mut index, entry),
            None => {
                history::remove_entry(&mut index, session_id);
            }
        }
        self.write_index(&index)
    }

    fn write_index(&self, index: &[HistoryEntry]) -> Result<()> {
        let json = serde_json::to_string(index)?;
        self.store.set(HISTORY_KEY, &json)
    }

    // Corrupt values are removed so the next read starts clean.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let corruption = ParleyError::StorageCorruption {
                    key: key.to_string(),
                    message: e.to_string(),
                };
                tracing::warn!("{}; discarding entry", corruption);
                self.store.remove(key)?;
                Ok(None)
            }
        }
    }
}
