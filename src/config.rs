//! Configuration management for Parley
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote assistant service settings
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Live voice conversation settings
    #[serde(default)]
    pub live: LiveConfig,
    /// Local session storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Relay server settings
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Remote assistant service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of the assistant API (routes live under `{base_url}/ai/...`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_assistant_timeout")]
    pub timeout_seconds: u64,

    /// Reply language name forwarded with every turn (e.g. "English")
    #[serde(default)]
    pub language: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_assistant_timeout() -> u64 {
    30
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_assistant_timeout(),
            language: None,
        }
    }
}

/// Live voice conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Whether a speech recognition device is available on this platform
    #[serde(default = "default_true")]
    pub speech_recognition_available: bool,

    /// Recognition and synthesis locale
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Human-readable language name sent as the reply language
    #[serde(default = "default_language_name")]
    pub language_name: String,

    /// Delay before the transcription source is restarted after it ends
    #[serde(default = "default_capture_restart_delay")]
    pub capture_restart_delay_ms: u64,

    /// Delay before listening resumes after speech output finishes
    #[serde(default = "default_post_speech_delay")]
    pub post_speech_delay_ms: u64,

    /// Phrase spoken when the assistant request fails
    #[serde(default = "default_apology")]
    pub apology: String,

    /// Start conversations with speech output muted
    #[serde(default)]
    pub start_muted: bool,
}

fn default_true() -> bool {
    true
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_language_name() -> String {
    "English".to_string()
}

fn default_capture_restart_delay() -> u64 {
    300
}

fn default_post_speech_delay() -> u64 {
    200
}

fn default_apology() -> String {
    "Sorry, I encountered an error. Please try again.".to_string()
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            speech_recognition_available: default_true(),
            locale: default_locale(),
            language_name: default_language_name(),
            capture_restart_delay_ms: default_capture_restart_delay(),
            post_speech_delay_ms: default_post_speech_delay(),
            apology: default_apology(),
            start_muted: false,
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for the local session cache (platform data dir when unset)
    #[serde(default)]
    pub path: Option<String>,
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the relay listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory of the session log database
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Host of the Ollama-compatible completion backend
    #[serde(default = "default_completion_host")]
    pub completion_host: String,

    /// Model used for text and voice turns
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model used for image turns
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_log_path() -> String {
    "data/sessions".to_string()
}

fn default_completion_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_text_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_vision_model() -> String {
    "llava:latest".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_path: default_log_path(),
            completion_host: default_completion_host(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("Failed to read {}: {}", path, e)))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("PARLEY_API_URL") {
            self.assistant.base_url = url;
        }
        if let Ok(language) = std::env::var("PARLEY_LANGUAGE") {
            self.assistant.language = Some(language);
        }
        if let Ok(path) = std::env::var("PARLEY_HISTORY_DB") {
            self.storage.path = Some(path);
        }
        if let Ok(bind) = std::env::var("PARLEY_RELAY_BIND") {
            self.relay.bind = bind;
        }
        if let Ok(host) = std::env::var("PARLEY_COMPLETION_HOST") {
            self.relay.completion_host = host;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.api_url {
            self.assistant.base_url = url.clone();
        }
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.assistant.base_url).is_err() {
            return Err(ParleyError::Config(format!(
                "assistant.base_url is not a valid URL: {}",
                self.assistant.base_url
            ))
            .into());
        }

        if self.assistant.timeout_seconds == 0 {
            return Err(ParleyError::Config(
                "assistant.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.live.apology.trim().is_empty() {
            return Err(
                ParleyError::Config("live.apology cannot be empty".to_string()).into(),
            );
        }

        if self.relay.text_model.is_empty() || self.relay.vision_model.is_empty() {
            return Err(
                ParleyError::Config("relay model names cannot be empty".to_string()).into(),
            );
        }

        if !(0.0..=2.0).contains(&self.relay.temperature) {
            return Err(ParleyError::Config(
                "relay.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
