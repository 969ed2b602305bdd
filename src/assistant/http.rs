//! HTTP client for the assistant service
//!
//! Text and voice turns are posted as JSON, image turns as multipart form
//! data. Every failure is mapped onto [`AssistantError`].

use crate::assistant::{AssistantClient, AssistantError, AssistantReply, UserTurn};
use crate::config::AssistantConfig;
use crate::error::{ParleyError, Result};
use crate::session::Session;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JSON body of text and voice turns
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// Success body returned by every turn route
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Failure body
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Assistant client speaking the relay's HTTP API
///
/// # Examples
///
/// ```
/// use parley::assistant::HttpAssistantClient;
/// use parley::config::AssistantConfig;
///
/// let client = HttpAssistantClient::new(&AssistantConfig::default()).unwrap();
/// assert_eq!(client.base_url(), "http://localhost:5000/api");
/// ```
#[derive(Debug, Clone)]
pub struct HttpAssistantClient {
    client: Client,
    base_url: String,
}

impl HttpAssistantClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        tracing::debug!("Initialized assistant client: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// The API base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the remote log of a session
    ///
    /// Returns `Ok(None)` when the service does not know the session.
    pub async fn get_history(
        &self,
        session_id: &str,
    ) -> std::result::Result<Option<Session>, AssistantError> {
        let url = format!("{}/ai/history/{}", self.base_url, session_id);
        tracing::debug!("Fetching remote history: {}", url);

        let response = self.client.get(&url).send().await.map_err(network_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_success_body(response).await?;

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| AssistantError::Service(format!("Malformed history response: {}", e)))
    }

    async fn post_json(
        &self,
        route: &str,
        message: &str,
        session_id: Option<&str>,
        language: Option<&str>,
    ) -> std::result::Result<Response, AssistantError> {
        let url = format!("{}/ai/{}", self.base_url, route);
        let request = ChatRequest {
            message,
            session_id,
            language,
        };

        tracing::debug!("POST {} ({} chars)", url, message.len());
        self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(network_error)
    }

    async fn post_image(
        &self,
        turn: &UserTurn,
        session_id: Option<&str>,
        language: Option<&str>,
    ) -> std::result::Result<Response, AssistantError> {
        let Some(image) = turn.image() else {
            return Err(AssistantError::Validation("Image is required".to_string()));
        };

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| AssistantError::Validation(format!("Invalid image type: {}", e)))?;

        let mut form = Form::new()
            .part("image", part)
            .text("question", turn.text().to_string());
        if let Some(id) = session_id {
            form = form.text("sessionId", id.to_string());
        }
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let url = format!("{}/ai/image", self.base_url);
        tracing::debug!("POST {} ({} image bytes)", url, image.bytes.len());
        self.client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)
    }
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn send(
        &self,
        turn: &UserTurn,
        session_id: Option<&str>,
        language: Option<&str>,
    ) -> std::result::Result<AssistantReply, AssistantError> {
        validate_turn(turn)?;

        let response = match turn {
            UserTurn::Text(text) => self.post_json("chat", text.trim(), session_id, language).await?,
            UserTurn::Voice(text) => {
                self.post_json("voice", text.trim(), session_id, language)
                    .await?
            }
            UserTurn::Image { .. } => self.post_image(turn, session_id, language).await?,
        };

        let body = read_success_body(response).await?;
        let reply: ReplyBody = serde_json::from_str(&body)
            .map_err(|e| AssistantError::Service(format!("Malformed assistant response: {}", e)))?;

        let response = reply.response.ok_or_else(|| {
            AssistantError::Validation("Assistant response is missing 'response'".to_string())
        })?;

        let session_id = match (reply.session_id, session_id) {
            (Some(id), _) => id,
            (None, Some(id)) => id.to_string(),
            (None, None) => {
                return Err(AssistantError::Validation(
                    "Assistant response is missing 'sessionId'".to_string(),
                ))
            }
        };

        tracing::debug!("Assistant replied for session {}", session_id);
        Ok(AssistantReply {
            response,
            session_id,
            image_url: reply.image_url,
        })
    }
}

fn validate_turn(turn: &UserTurn) -> std::result::Result<(), AssistantError> {
    let missing = match turn {
        UserTurn::Text(text) if text.trim().is_empty() => Some("Message is required"),
        UserTurn::Voice(text) if text.trim().is_empty() => Some("Voice message is required"),
        UserTurn::Image { image, .. } if image.bytes.is_empty() => Some("Image is required"),
        UserTurn::Image { question, .. } if question.trim().is_empty() => {
            Some("Question is required")
        }
        _ => None,
    };

    match missing {
        Some(message) => Err(AssistantError::Validation(message.to_string())),
        None => Ok(()),
    }
}

fn network_error(e: reqwest::Error) -> AssistantError {
    tracing::error!("Assistant request failed: {}", e);
    AssistantError::Network(e.to_string())
}

async fn read_success_body(response: Response) -> std::result::Result<String, AssistantError> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if status.is_success() {
        return Ok(body);
    }

    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| status.to_string());

    tracing::error!("Assistant service returned {}: {}", status, message);
    if status == StatusCode::BAD_REQUEST {
        Err(AssistantError::Validation(message))
    } else {
        Err(AssistantError::Service(message))
    }
}
