//! Parley - text, voice, and image chat with a remote assistant
//!
//! This library provides the pieces behind the `parley` CLI: the remote
//! assistant client, the live turn-taking controller, local session history,
//! and the relay server that keeps the remote session log.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `assistant`: Remote assistant client and turn types
//! - `live`: Live conversation state machine and its async driver
//! - `session`: Messages, sessions, and the local key-value history
//! - `conversation`: Typed (non-live) conversations
//! - `relay`: HTTP relay server, remote session log, and completion backend
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use parley::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod live;
pub mod relay;
pub mod session;

// Re-export commonly used types
pub use assistant::{AssistantClient, AssistantReply, HttpAssistantClient, UserTurn};
pub use config::Config;
pub use conversation::TextConversation;
pub use error::{ParleyError, Result};
pub use live::{LiveState, TurnController};
pub use session::{Message, MessageType, Session, SessionPersistence};

#[cfg(test)]
pub mod test_utils;
