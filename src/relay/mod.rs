//! Assistant relay server
//!
//! A thin HTTP service that keeps the remote per-session log and forwards
//! each turn to a completion backend.

pub mod completion;
pub mod log;
pub mod server;

pub use completion::{
    Completer, CompletionMessage, CompletionRequest, CompletionRole, OllamaCompleter,
};
pub use log::{SessionLog, SledSessionLog};
pub use server::{router, serve, RelaySettings, RelayState};
