//! Remote assistant client
//!
//! The assistant service is an opaque collaborator: a user turn goes in,
//! reply text and a (possibly new) session identifier come back. Every
//! failure is one [`AssistantError`] so callers can treat it as a single
//! signal while keeping the detail for display.

use crate::error::ParleyError;
use crate::session::MessageType;
use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod image;

pub use self::http::HttpAssistantClient;
pub use self::image::ImageAttachment;

/// Content of one user turn
#[derive(Debug, Clone, PartialEq)]
pub enum UserTurn {
    /// Typed text
    Text(String),
    /// Speech-recognized text
    Voice(String),
    /// A question about an image
    Image {
        /// The image to analyze
        image: ImageAttachment,
        /// The user's question
        question: String,
    },
}

impl UserTurn {
    /// Message type recorded for this turn
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text(_) => MessageType::Text,
            Self::Voice(_) => MessageType::Voice,
            Self::Image { .. } => MessageType::Image,
        }
    }

    /// The text of the turn (the question for image turns)
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Voice(text) => text,
            Self::Image { question, .. } => question,
        }
    }

    /// The attached image, if any
    pub fn image(&self) -> Option<&ImageAttachment> {
        match self {
            Self::Image { image, .. } => Some(image),
            _ => None,
        }
    }
}

/// Successful assistant reply
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    /// Reply text
    pub response: String,
    /// Session identifier confirmed by the service
    pub session_id: String,
    /// Reference to the stored image for image turns
    pub image_url: Option<String>,
}

/// Failure of a remote assistant call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssistantError {
    /// No response reached the service (connect failure, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a failure
    #[error("{0}")]
    Service(String),

    /// A required field was missing
    #[error("{0}")]
    Validation(String),
}

impl From<AssistantError> for ParleyError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::Network(m) => ParleyError::Network(m),
            AssistantError::Service(m) => ParleyError::Service(m),
            AssistantError::Validation(m) => ParleyError::Validation(m),
        }
    }
}

/// Sends user turns to the assistant service
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Send one turn
    ///
    /// # Arguments
    ///
    /// * `turn` - The user's message
    /// * `session_id` - Existing session to continue; `None` lets the service allocate one
    /// * `language` - Free-text name of the language the reply should use
    async fn send(
        &self,
        turn: &UserTurn,
        session_id: Option<&str>,
        language: Option<&str>,
    ) -> std::result::Result<AssistantReply, AssistantError>;
}
