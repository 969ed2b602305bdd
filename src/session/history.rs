//! History index maintenance
//!
//! A [`HistoryEntry`] is a derived summary of one session used to browse
//! conversations without loading their full message lists. Entries are
//! always recomputed from the complete message list, never patched.

use crate::session::{Message, MessageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in characters before truncation
pub const TITLE_MAX_CHARS: usize = 50;

/// Maximum preview length in characters before truncation
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Preview shown for a session that has no reply yet
pub const NO_RESPONSE_PREVIEW: &str = "No response yet";

const ELLIPSIS: &str = "...";

/// Summary record for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Session this entry summarizes
    pub session_id: String,
    /// First user message, truncated
    pub title: String,
    /// Second message, truncated
    pub preview: String,
    /// Instant of the last update
    pub timestamp: DateTime<Utc>,
    /// Number of messages in the session
    pub message_count: usize,
    /// Type of the first user message
    #[serde(rename = "type", default)]
    pub entry_type: MessageType,
}

/// Truncate `text` to `max_chars` characters, appending `...` when cut
///
/// # Examples
///
/// ```
/// use parley::session::history::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("short", 50), "short");
/// assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
/// ```
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Derive the history entry for a session from its full message list
///
/// Returns `None` when the session holds no user message, since such a
/// session must not appear in the index.
pub fn derive_entry(
    session_id: &str,
    messages: &[Message],
    updated_at: DateTime<Utc>,
) -> Option<HistoryEntry> {
    let first_user = messages.iter().find(|m| m.is_user())?;

    let preview = match messages.get(1) {
        Some(second) => truncate_with_ellipsis(&second.content, PREVIEW_MAX_CHARS),
        None => NO_RESPONSE_PREVIEW.to_string(),
    };

    Some(HistoryEntry {
        session_id: session_id.to_string(),
        title: truncate_with_ellipsis(&first_user.content, TITLE_MAX_CHARS),
        preview,
        timestamp: updated_at,
        message_count: messages.len(),
        entry_type: first_user.message_type,
    })
}

/// Replace (or insert) the entry for its session, moving it to the front
pub fn upsert_entry(index: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    index.retain(|e| e.session_id != entry.session_id);
    index.insert(0, entry);
}

/// Remove the entry for `session_id`, returning true if one was present
pub fn remove_entry(index: &mut Vec<HistoryEntry>, session_id: &str) -> bool {
    let before = index.len();
    index.retain(|e| e.session_id != session_id);
    index.len() != before
}

/// Filter entries by a case-insensitive substring of title or preview
///
/// A blank term matches everything.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use parley::session::history::{search_entries, HistoryEntry};
/// use parley::session::MessageType;
///
/// let entry = |title: &str| HistoryEntry {
///     session_id: title.to_string(),
///     title: title.to_string(),
///     preview: String::new(),
///     timestamp: Utc::now(),
///     message_count: 2,
///     entry_type: MessageType::Text,
/// };
/// let index = vec![entry("What's the weather today"), entry("Tell me a joke")];
/// let hits = search_entries(&index, "Weather");
/// assert_eq!(hits.len(), 1);
/// ```
pub fn search_entries(index: &[HistoryEntry], term: &str) -> Vec<HistoryEntry> {
    if term.trim().is_empty() {
        return index.to_vec();
    }
    let needle = term.to_lowercase();

    index
        .iter()
        .filter(|e| {
            e.title.to_lowercase().contains(&needle) || e.preview.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Human-friendly age of an entry relative to `now`
pub fn format_relative(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(timestamp);
    if age.num_hours() < 1 {
        "Just now".to_string()
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else if age.num_days() < 7 {
        format!("{}d ago", age.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}
