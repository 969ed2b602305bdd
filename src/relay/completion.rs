//! Completion backend used by the relay
//!
//! The relay only needs "messages in, text out". [`OllamaCompleter`] speaks
//! Ollama's non-streaming `/api/chat` endpoint; images travel as base64
//! strings on the message that mentions them.

use crate::config::RelayConfig;
use crate::error::{ParleyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Author of a completion message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionRole {
    /// Instructions for the model
    System,
    /// The person chatting
    User,
    /// The model
    Assistant,
}

/// One message of a completion context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMessage {
    /// Author
    pub role: CompletionRole,
    /// Text content
    pub content: String,
    /// Base64-encoded images
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl CompletionMessage {
    /// Text-only message
    pub fn new(role: CompletionRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Attach a base64-encoded image
    pub fn with_image(mut self, base64: impl Into<String>) -> Self {
        self.images.push(base64.into());
        self
    }
}

/// A completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model name
    pub model: String,
    /// Conversation context, oldest first
    pub messages: Vec<CompletionMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
}

/// Produces assistant text from a conversation context
#[async_trait]
pub trait Completer: Send + Sync {
    /// Run one completion and return the reply text (possibly empty)
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [CompletionMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaReplyMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaReplyMessage {
    #[serde(default)]
    content: String,
}

/// Completer backed by an Ollama server
///
/// # Examples
///
/// ```
/// use parley::config::RelayConfig;
/// use parley::relay::OllamaCompleter;
///
/// let completer = OllamaCompleter::new(&RelayConfig::default()).unwrap();
/// assert_eq!(completer.host(), "http://localhost:11434");
/// ```
pub struct OllamaCompleter {
    client: Client,
    host: String,
}

impl OllamaCompleter {
    /// Create a completer for `config.completion_host`
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Service(format!("Failed to create HTTP client: {}", e)))?;

        let host = config.completion_host.trim_end_matches('/').to_string();
        tracing::info!(
            "Initialized Ollama completer: host={}, text_model={}, vision_model={}",
            host,
            config.text_model,
            config.vision_model
        );

        Ok(Self { client, host })
    }

    /// The configured Ollama host
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.host);
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        tracing::debug!(
            "Sending Ollama request: model={}, {} messages",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                ParleyError::Service(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(ParleyError::Service(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let parsed: OllamaChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            ParleyError::Service(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, completion_tokens={}",
            parsed.done,
            parsed.eval_count
        );

        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }
}
