//! Error types for Parley
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parley operations
///
/// Covers the device errors of a live conversation, remote assistant
/// failures, local storage problems, and configuration mistakes.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Speech capture or recognition device failure
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Speech output device failure
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The request never reached the assistant service
    #[error("Network error: {0}")]
    Network(String),

    /// The assistant service answered with a failure
    #[error("Service error: {0}")]
    Service(String),

    /// A required field was missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// A cached entry could not be parsed
    #[error("Corrupt storage entry '{key}': {message}")]
    StorageCorruption {
        /// Storage key holding the malformed value
        key: String,
        /// Parser message
        message: String,
    },

    /// Local or remote storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A platform capability the feature depends on is missing
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Parley operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
