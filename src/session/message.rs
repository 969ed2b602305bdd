use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed, spoken, or image question from the person chatting
    User,
    /// Reply produced by the assistant service
    Assistant,
}

/// How a message entered the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain typed text
    #[default]
    Text,
    /// Text produced by speech recognition
    Voice,
    /// Question about an attached image
    Image,
    /// A failure shown in place of a reply
    Error,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Voice => write!(f, "voice"),
            Self::Image => write!(f, "image"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single chat message
///
/// Messages are immutable once created and are only ever appended to a
/// session. The JSON shape uses camelCase keys so caches written by the
/// browser client load unchanged.
///
/// # Examples
///
/// ```
/// use parley::session::{Message, MessageType, Role};
///
/// let msg = Message::user("What's the weather today?", MessageType::Voice);
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(msg.message_type, MessageType::Voice);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Who wrote the message
    pub role: Role,
    /// Input channel of the message
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Message text
    pub content: String,
    /// Opaque reference to an attached image (data URL or remote URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Creation instant
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role,
            message_type,
            content: content.into(),
            image_url: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>, message_type: MessageType) -> Self {
        Self::new(Role::User, content, message_type)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>, message_type: MessageType) -> Self {
        Self::new(Role::Assistant, content, message_type)
    }

    /// Attaches an image reference to the message
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Returns true if the message was written by the user
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

// The browser client stored numeric ids (`Date.now()`); accept both shapes.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
