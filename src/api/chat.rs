//! Chat widget endpoints
//!
//! Public:
//! - POST /api/v1/chat/sessions - Open a session
//! - POST /api/v1/chat - Send `{sessionId, message}`, get `{success, reply}`
//! - GET /api/v1/chat?sessionId= - Transcript
//!
//! Admin (editor):
//! - GET /api/v1/admin/chat/sessions - Sessions with message counts
//! - GET /api/v1/admin/chat/sessions/{id} - Transcript

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ApiJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ChatMessage, ChatSession, ChatSessionSummary};
use crate::services::{CreateChatSessionInput, SendMessageInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptQuery {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReplyResponse {
    pub success: bool,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<ChatSessionSummary>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message).get(get_transcript))
        .route("/sessions", post(create_session))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(admin_transcript))
}

async fn create_session(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(String::from);
    // the widget may open a session without a body
    let input: CreateChatSessionInput = if body.iter().all(u8::is_ascii_whitespace) {
        CreateChatSessionInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid JSON body: {}", e)))?
    };
    let user_id = user.map(|Extension(AuthenticatedUser(u))| u.id);

    let session = state
        .chat_relay
        .create_session(input, user_id, user_agent)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn send_message(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendMessageInput>,
) -> Result<Json<ChatReplyResponse>, ApiError> {
    let reply = state.chat_relay.send(body).await?;
    Ok(Json(ChatReplyResponse {
        success: true,
        reply,
    }))
}

async fn get_transcript(
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let messages = state.chat_relay.transcript(&query.session_id).await?;
    Ok(Json(TranscriptResponse { messages }))
}

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.chat_relay.list_sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn admin_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let messages = state.chat_relay.transcript(&id).await?;
    Ok(Json(TranscriptResponse { messages }))
}
