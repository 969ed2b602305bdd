//! Conversation sessions and their local persistence
//!
//! A session is an ordered, append-only list of messages. The local store
//! keeps one JSON message list per session under `chat_<sessionId>` and a
//! single derived history index under `chatHistory`.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod history;
pub mod message;
pub mod persistence;
pub mod store;

pub use history::HistoryEntry;
pub use message::{Message, MessageType, Role};
pub use persistence::SessionPersistence;
pub use store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};

const SESSION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// An identified conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier
    pub session_id: String,
    /// Messages in conversation order
    pub messages: Vec<Message>,
    /// Timestamp of the first message (or of creation when empty)
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest message (or of creation when empty)
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session
    pub fn empty(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a session from a stored message list
    pub fn from_messages(session_id: impl Into<String>, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        let created_at = messages.first().map(|m| m.timestamp).unwrap_or(now);
        let updated_at = messages.last().map(|m| m.timestamp).unwrap_or(now);
        Self {
            session_id: session_id.into(),
            messages,
            created_at,
            updated_at,
        }
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true when the session holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Generate a client-side session identifier
///
/// The identifier is the current Unix time in milliseconds followed by a
/// random lowercase base-36 suffix.
///
/// # Examples
///
/// ```
/// use parley::session::new_session_id;
///
/// let id = new_session_id();
/// assert!(id.len() > 9);
/// assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
/// ```
pub fn new_session_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", millis, suffix)
}
