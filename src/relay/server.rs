//! HTTP relay between chat clients and the completion backend
//!
//! Routes (all JSON unless noted):
//!
//! - `POST /api/ai/chat` text turn
//! - `POST /api/ai/voice` voice-transcribed turn
//! - `POST /api/ai/image` image turn (multipart: `image`, `question`, `sessionId`, `language`)
//! - `GET /api/ai/history/:session_id` stored session record
//! - `GET /health`

use crate::assistant::ImageAttachment;
use crate::config::RelayConfig;
use crate::error::{ParleyError, Result};
use crate::relay::{
    Completer, CompletionMessage, CompletionRequest, CompletionRole, OllamaCompleter, SessionLog,
    SledSessionLog,
};
use crate::session::{new_session_id, Message, MessageType, Role, Session};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Largest accepted request body (room for a 5 MiB image plus form overhead)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const TEXT_FALLBACK: &str = "Sorry, I could not generate a response.";
const IMAGE_FALLBACK: &str = "Sorry, I could not analyze the image.";

/// Model parameters used for every completion
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Model for text and voice turns
    pub text_model: String,
    /// Model for image turns
    pub vision_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum reply tokens
    pub max_tokens: u32,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// One async lock per session id, held by a turn from load to save
#[derive(Clone, Default)]
struct SessionLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    fn lock_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only the map still holds belong to finished turns
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(session_id.to_string()).or_default().clone()
    }
}

/// Shared state of the relay handlers
#[derive(Clone)]
pub struct RelayState {
    log: Arc<dyn SessionLog>,
    completer: Arc<dyn Completer>,
    settings: RelaySettings,
    locks: SessionLocks,
}

impl RelayState {
    /// Bundle the session log, completion backend, and model settings
    pub fn new(
        log: Arc<dyn SessionLog>,
        completer: Arc<dyn Completer>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            log,
            completer,
            settings,
            locks: SessionLocks::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnResponse {
    response: String,
    session_id: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

/// Handler failure rendered as a JSON body
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal { error: String, message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
            }
            Self::NotFound(error) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": error }))).into_response()
            }
            Self::Internal { error, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error, "message": message })),
            )
                .into_response(),
        }
    }
}

/// Build the relay router
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/api/ai/chat", post(handle_text_chat))
        .route("/api/ai/voice", post(handle_voice_chat))
        .route("/api/ai/image", post(handle_image_chat))
        .route("/api/ai/history/:session_id", get(handle_history))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Run the relay until Ctrl-C
///
/// # Errors
///
/// Returns error if the session log cannot be opened or the address cannot
/// be bound
pub async fn serve(config: &RelayConfig) -> Result<()> {
    let log = SledSessionLog::new(&config.log_path)?;
    let completer = OllamaCompleter::new(config)?;
    let state = RelayState::new(Arc::new(log), Arc::new(completer), config.into());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("Relay listening on {}", config.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Relay shutting down");
        })
        .await?;

    Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "message": "Parley relay is running" }))
}

async fn handle_text_chat(
    State(state): State<RelayState>,
    Json(body): Json<TurnBody>,
) -> std::result::Result<Json<TurnResponse>, ApiError> {
    run_text_turn(&state, MessageType::Text, body).await
}

async fn handle_voice_chat(
    State(state): State<RelayState>,
    Json(body): Json<TurnBody>,
) -> std::result::Result<Json<TurnResponse>, ApiError> {
    run_text_turn(&state, MessageType::Voice, body).await
}

async fn run_text_turn(
    state: &RelayState,
    message_type: MessageType,
    body: TurnBody,
) -> std::result::Result<Json<TurnResponse>, ApiError> {
    let Some(message) = non_empty(body.message) else {
        let error = match message_type {
            MessageType::Voice => "Voice message is required",
            _ => "Message is required",
        };
        return Err(ApiError::BadRequest(error.to_string()));
    };

    let failure = |e: anyhow::Error| turn_failure(message_type, e);
    let session_id = non_empty(body.session_id).unwrap_or_else(new_session_id);
    let lock = state.locks.lock_for(&session_id);
    let _turn = lock.lock().await;
    let mut session = state.log.find_or_create(&session_id).map_err(failure)?;
    state
        .log
        .append_message(&mut session, Message::user(message, message_type));

    let request = CompletionRequest {
        model: state.settings.text_model.clone(),
        messages: text_context(&session, non_empty(body.language).as_deref()),
        temperature: state.settings.temperature,
        max_tokens: state.settings.max_tokens,
    };
    let reply = complete_or(state, &request, TEXT_FALLBACK)
        .await
        .map_err(failure)?;

    state.log.append_message(
        &mut session,
        Message::assistant(reply.clone(), message_type),
    );
    state.log.save(&session).map_err(failure)?;

    tracing::info!(
        "Answered {} turn for session {} ({} messages)",
        message_type,
        session_id,
        session.messages.len()
    );
    Ok(Json(TurnResponse {
        response: reply,
        session_id,
        message_type,
        image_url: None,
    }))
}

async fn handle_image_chat(
    State(state): State<RelayState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<TurnResponse>, ApiError> {
    let mut image: Option<ImageAttachment> = None;
    let mut question = None;
    let mut session_id = None;
    let mut language = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid image upload: {}", e)))?;
                if !bytes.is_empty() {
                    let attachment = ImageAttachment::from_bytes(file_name, bytes.to_vec())
                        .map_err(|e| ApiError::BadRequest(validation_message(e)))?;
                    image = Some(attachment);
                }
            }
            "question" | "sessionId" | "language" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
                match name.as_str() {
                    "question" => question = Some(value),
                    "sessionId" => session_id = Some(value),
                    _ => language = Some(value),
                }
            }
            other => tracing::debug!("Ignoring unexpected form field {}", other),
        }
    }

    let Some(image) = image else {
        return Err(ApiError::BadRequest("Image is required".to_string()));
    };
    let Some(question) = non_empty(question) else {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    };

    let failure = |e: anyhow::Error| turn_failure(MessageType::Image, e);
    let session_id = non_empty(session_id).unwrap_or_else(new_session_id);
    let data_url = image.data_url();

    let lock = state.locks.lock_for(&session_id);
    let _turn = lock.lock().await;
    let mut session = state.log.find_or_create(&session_id).map_err(failure)?;
    state.log.append_message(
        &mut session,
        Message::user(question.clone(), MessageType::Image).with_image_url(data_url.clone()),
    );

    let request = CompletionRequest {
        model: state.settings.vision_model.clone(),
        messages: image_context(&question, &image, non_empty(language).as_deref()),
        temperature: state.settings.temperature,
        max_tokens: state.settings.max_tokens,
    };
    let reply = complete_or(&state, &request, IMAGE_FALLBACK)
        .await
        .map_err(failure)?;

    state.log.append_message(
        &mut session,
        Message::assistant(reply.clone(), MessageType::Image),
    );
    state.log.save(&session).map_err(failure)?;

    tracing::info!("Answered image turn for session {}", session_id);
    Ok(Json(TurnResponse {
        response: reply,
        session_id,
        message_type: MessageType::Image,
        image_url: Some(data_url),
    }))
}

async fn handle_history(
    State(state): State<RelayState>,
    Path(session_id): Path<String>,
) -> std::result::Result<Json<Session>, ApiError> {
    match state.log.find_by_session_id(&session_id) {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(ApiError::NotFound("Chat session not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to load session {}: {}", session_id, e);
            Err(ApiError::Internal {
                error: "Failed to get chat history".to_string(),
                message: e.to_string(),
            })
        }
    }
}

async fn complete_or(
    state: &RelayState,
    request: &CompletionRequest,
    fallback: &str,
) -> Result<String> {
    let reply = state.completer.complete(request).await?;
    if reply.trim().is_empty() {
        tracing::warn!("Completion backend returned an empty reply");
        return Ok(fallback.to_string());
    }
    Ok(reply)
}

/// System instruction pinning the reply language
pub fn language_instruction(language: &str) -> String {
    format!(
        "You are a helpful assistant. You must ALWAYS respond in {language}. If the user \
         speaks in a different language, understand their intent but reply strictly in {language}."
    )
}

/// Completion context for text and voice turns: the whole session
pub fn text_context(session: &Session, language: Option<&str>) -> Vec<CompletionMessage> {
    let mut messages = Vec::with_capacity(session.messages.len() + 1);
    if let Some(language) = language {
        messages.push(CompletionMessage::new(
            CompletionRole::System,
            language_instruction(language),
        ));
    }
    messages.extend(session.messages.iter().map(|m| {
        let role = match m.role {
            Role::User => CompletionRole::User,
            Role::Assistant => CompletionRole::Assistant,
        };
        CompletionMessage::new(role, m.content.clone())
    }));
    messages
}

/// Completion context for image turns: the question and the image only
pub fn image_context(
    question: &str,
    image: &ImageAttachment,
    language: Option<&str>,
) -> Vec<CompletionMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(language) = language {
        messages.push(CompletionMessage::new(
            CompletionRole::System,
            language_instruction(language),
        ));
    }
    messages.push(
        CompletionMessage::new(
            CompletionRole::User,
            format!(
                "Please analyze this image and answer the following question: {}",
                question
            ),
        )
        .with_image(image.base64()),
    );
    messages
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn turn_failure(message_type: MessageType, e: anyhow::Error) -> ApiError {
    tracing::error!("{} chat failed: {}", message_type, e);
    ApiError::Internal {
        error: format!("Failed to process {} chat", message_type),
        message: e.to_string(),
    }
}

fn validation_message(e: anyhow::Error) -> String {
    match e.downcast_ref::<ParleyError>() {
        Some(ParleyError::Validation(message)) => message.clone(),
        _ => e.to_string(),
    }
}
