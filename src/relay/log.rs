//! Durable per-session message log
//!
//! The relay keeps one record per session in an embedded `sled` database.
//! Records are append-only from the service's point of view: a turn loads
//! the record (or starts a new one), appends messages, and saves it whole.

use crate::error::{ParleyError, Result};
use crate::session::{Message, Session};
use sled::Db;
use std::path::Path;

/// Storage of remote session records
pub trait SessionLog: Send + Sync {
    /// Look up a session record
    fn find_by_session_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Start a new, unsaved record
    fn create(&self, session_id: &str) -> Session {
        Session::empty(session_id)
    }

    /// Append a message to a record in memory
    fn append_message(&self, session: &mut Session, message: Message) {
        session.updated_at = message.timestamp;
        session.messages.push(message);
    }

    /// Persist a record, replacing any previous version
    fn save(&self, session: &Session) -> Result<()>;

    /// The stored record, or a fresh unsaved one
    fn find_or_create(&self, session_id: &str) -> Result<Session> {
        Ok(self
            .find_by_session_id(session_id)?
            .unwrap_or_else(|| self.create(session_id)))
    }
}

/// Session log backed by `sled`
pub struct SledSessionLog {
    db: Db,
}

impl SledSessionLog {
    /// Open or create a session log
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::relay::{SessionLog, SledSessionLog};
    ///
    /// # fn main() -> parley::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let log = SledSessionLog::new(dir.path().join("sessions"))?;
    /// assert!(log.find_by_session_id("missing")?.is_none());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ParleyError::Storage(format!("Failed to open session log: {}", e)))?;
        Ok(Self { db })
    }

    /// Open a log that is deleted when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ParleyError::Storage(format!("Failed to open session log: {}", e)))?;
        Ok(Self { db })
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Returns true when no session is stored
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl SessionLog for SledSessionLog {
    fn find_by_session_id(&self, session_id: &str) -> Result<Option<Session>> {
        match self
            .db
            .get(session_id.as_bytes())
            .map_err(|e| ParleyError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let session = serde_json::from_slice(&bytes)
                    .map_err(|e| ParleyError::Storage(format!("Deserialization failed: {}", e)))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let value = serde_json::to_vec(session)
            .map_err(|e| ParleyError::Storage(format!("Serialization failed: {}", e)))?;

        self.db
            .insert(session.session_id.as_bytes(), value)
            .map_err(|e| ParleyError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| ParleyError::Storage(format!("Flush failed: {}", e)))?;

        tracing::debug!(
            "Saved session {} ({} messages)",
            session.session_id,
            session.messages.len()
        );
        Ok(())
    }
}
