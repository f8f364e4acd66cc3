//! Chat relay
//!
//! Stores widget conversations and forwards each user message to an external
//! automation webhook. The webhook answers with `{reply}` (or `message` /
//! `response`). When it is not configured, slow, or silent, the customer
//! gets one of the configured canned replies instead.

use crate::config::ChatConfig;
use crate::db::repositories::ChatRepository;
use crate::models::{ChatMessage, ChatSender, ChatSession, ChatSessionSummary};
use crate::services::rate_limiter::SlidingWindow;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CHANNEL: &str = "web";
const MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("sessionId and message are required")]
    MissingFields,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Too many messages, slow down")]
    RateLimited,

    #[error("Chat webhook responded with status {0}")]
    Upstream(u16),

    #[error("Chat webhook request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub session_id: Option<String>,
    pub message: Option<String>,
}

/// Body of `POST /chat/sessions`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatSessionInput {
    pub session_id: Option<String>,
    pub channel: Option<String>,
}

pub struct ChatRelay {
    repo: Arc<dyn ChatRepository>,
    client: reqwest::Client,
    config: ChatConfig,
    limiter: SlidingWindow<String>,
}

impl ChatRelay {
    pub fn new(repo: Arc<dyn ChatRepository>, config: ChatConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build chat HTTP client")?;
        let limiter = SlidingWindow::new(config.messages_per_minute, chrono::Duration::minutes(1));

        Ok(Self {
            repo,
            client,
            config,
            limiter,
        })
    }

    /// Open a session. The id is generated unless the widget supplies one;
    /// an existing id is returned unchanged.
    pub async fn create_session(
        &self,
        input: CreateChatSessionInput,
        user_id: Option<i64>,
        user_agent: Option<String>,
    ) -> Result<ChatSession, ChatError> {
        let id = match input.session_id.map(|s| s.trim().to_string()) {
            Some(id) if !id.is_empty() => {
                if let Some(existing) = self
                    .repo
                    .get_session(&id)
                    .await
                    .context("Failed to get chat session")?
                {
                    return Ok(existing);
                }
                id
            }
            _ => generate_session_id(),
        };

        let session = ChatSession {
            id,
            user_id,
            channel: Some(input.channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_string())),
            metadata: Some(json!({
                "created_from": "chat_widget",
                "user_agent": user_agent,
            })),
            created_at: Utc::now(),
        };

        let created = self
            .repo
            .create_session(&session)
            .await
            .context("Failed to create chat session")?;
        tracing::debug!(session_id = %created.id, "Chat session created");
        Ok(created)
    }

    /// Store the user's message, relay it and store the answer. Returns the
    /// reply shown to the customer.
    pub async fn send(&self, input: SendMessageInput) -> Result<String, ChatError> {
        let session_id = input.session_id.map(|s| s.trim().to_string()).unwrap_or_default();
        let message = input.message.map(|m| m.trim().to_string()).unwrap_or_default();
        if session_id.is_empty() || message.is_empty() {
            return Err(ChatError::MissingFields);
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::ValidationError(format!(
                "Message cannot exceed {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }
        if !self.limiter.try_acquire(session_id.clone()).await {
            return Err(ChatError::RateLimited);
        }

        self.ensure_session(&session_id).await?;
        self.repo
            .add_message(&session_id, ChatSender::User, &message, None)
            .await
            .context("Failed to save chat message")?;

        let (reply, fallback) = match self.config.webhook_url.as_deref() {
            None | Some("") => (self.config.unavailable_message.clone(), Some("unavailable")),
            Some(url) => self.relay(url, &session_id, &message).await?,
        };

        let metadata = fallback.map(|kind| json!({ "fallback": kind }));
        self.repo
            .add_message(&session_id, ChatSender::Assistant, &reply, metadata.as_ref())
            .await
            .context("Failed to save chat reply")?;

        Ok(reply)
    }

    async fn relay(
        &self,
        url: &str,
        session_id: &str,
        message: &str,
    ) -> Result<(String, Option<&'static str>), ChatError> {
        let payload = json!({
            "sessionId": session_id,
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = match self.client.post(url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                tracing::warn!(session_id = %session_id, "Chat webhook timed out");
                return Ok((self.config.timeout_message.clone(), Some("timeout")));
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "Chat webhook request failed");
                return Err(ChatError::RequestFailed(err));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!(session_id = %session_id, status = status.as_u16(), "Chat webhook error");
            return Err(ChatError::Upstream(status.as_u16()));
        }

        let body = match response.json::<Value>().await {
            Ok(body) => body,
            Err(err) if err.is_timeout() => {
                return Ok((self.config.timeout_message.clone(), Some("timeout")));
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Chat webhook returned no JSON");
                Value::Null
            }
        };

        Ok(match extract_reply(&body) {
            Some(reply) => (reply, None),
            None => (self.config.empty_reply_message.clone(), Some("empty")),
        })
    }

    async fn ensure_session(&self, session_id: &str) -> Result<(), ChatError> {
        let exists = self
            .repo
            .get_session(session_id)
            .await
            .context("Failed to get chat session")?
            .is_some();
        if !exists {
            self.create_session(
                CreateChatSessionInput {
                    session_id: Some(session_id.to_string()),
                    channel: None,
                },
                None,
                None,
            )
            .await?;
        }
        Ok(())
    }

    /// Messages of a session in chronological order
    pub async fn transcript(&self, session_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        if session_id.trim().is_empty() {
            return Err(ChatError::MissingFields);
        }
        Ok(self
            .repo
            .messages(session_id.trim())
            .await
            .context("Failed to load chat transcript")?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<ChatSessionSummary>, ChatError> {
        Ok(self
            .repo
            .list_sessions()
            .await
            .context("Failed to list chat sessions")?)
    }

    pub async fn count_sessions(&self) -> Result<i64, ChatError> {
        Ok(self
            .repo
            .count_sessions()
            .await
            .context("Failed to count chat sessions")?)
    }

    pub async fn cleanup_rate_limits(&self) {
        self.limiter.cleanup().await;
    }
}

/// `chat_<unix millis>_<9 random chars>`
pub fn generate_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("chat_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

fn extract_reply(body: &Value) -> Option<String> {
    ["reply", "message", "response"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxChatRepository;
    use crate::db::{create_test_pool, migrations};
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn spawn_webhook() -> String {
        let app = Router::new()
            .route(
                "/reply",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "reply": format!("Recibido: {}", body["message"].as_str().unwrap_or("")) }))
                }),
            )
            .route("/message", post(|| async { Json(json!({ "message": "Hola desde message" })) }))
            .route("/empty", post(|| async { Json(json!({ "reply": "  " })) }))
            .route("/broken", post(|| async { (StatusCode::BAD_GATEWAY, "down") }))
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Json(json!({ "reply": "tarde" }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn setup_relay(webhook_url: Option<String>, timeout_secs: u64) -> ChatRelay {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let config = ChatConfig {
            webhook_url,
            timeout_secs,
            messages_per_minute: 3,
            ..Default::default()
        };
        ChatRelay::new(SqlxChatRepository::boxed(pool), config).unwrap()
    }

    fn send(session: &str, message: &str) -> SendMessageInput {
        SendMessageInput {
            session_id: Some(session.to_string()),
            message: Some(message.to_string()),
        }
    }

    #[test]
    fn test_generate_session_id_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "chat");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_extract_reply_precedence() {
        assert_eq!(extract_reply(&json!({"reply": "a", "message": "b"})).as_deref(), Some("a"));
        assert_eq!(extract_reply(&json!({"reply": "", "response": "c"})).as_deref(), Some("c"));
        assert_eq!(extract_reply(&json!({"reply": 5})), None);
        assert_eq!(extract_reply(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_create_session_metadata_and_reuse() {
        let relay = setup_relay(None, 10).await;
        let session = relay
            .create_session(CreateChatSessionInput::default(), None, Some("Mozilla/5.0".into()))
            .await
            .unwrap();
        assert!(session.id.starts_with("chat_"));
        assert_eq!(session.channel.as_deref(), Some("web"));
        let metadata = session.metadata.unwrap();
        assert_eq!(metadata["created_from"], "chat_widget");
        assert_eq!(metadata["user_agent"], "Mozilla/5.0");

        let again = relay
            .create_session(
                CreateChatSessionInput {
                    session_id: Some(session.id.clone()),
                    channel: Some("whatsapp".into()),
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(again.channel.as_deref(), Some("web"));
        assert_eq!(relay.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_webhook_returns_unavailable() {
        let relay = setup_relay(None, 10).await;
        let reply = relay.send(send("chat_1_abc", "Hola")).await.unwrap();
        assert_eq!(reply, ChatConfig::default().unavailable_message);

        let transcript = relay.transcript("chat_1_abc").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].sender, ChatSender::User);
        assert_eq!(transcript[0].message, "Hola");
        assert_eq!(transcript[1].sender, ChatSender::Assistant);
        assert_eq!(transcript[1].metadata, Some(json!({"fallback": "unavailable"})));
    }

    #[tokio::test]
    async fn test_relay_reply_fields() {
        let base = spawn_webhook().await;

        let relay = setup_relay(Some(format!("{}/reply", base)), 5).await;
        let reply = relay.send(send("s1", "¿Tienen paquetes a Cancún?")).await.unwrap();
        assert_eq!(reply, "Recibido: ¿Tienen paquetes a Cancún?");

        let relay = setup_relay(Some(format!("{}/message", base)), 5).await;
        assert_eq!(relay.send(send("s2", "hola")).await.unwrap(), "Hola desde message");

        let relay = setup_relay(Some(format!("{}/empty", base)), 5).await;
        assert_eq!(
            relay.send(send("s3", "hola")).await.unwrap(),
            ChatConfig::default().empty_reply_message
        );
    }

    #[tokio::test]
    async fn test_relay_upstream_error() {
        let base = spawn_webhook().await;
        let relay = setup_relay(Some(format!("{}/broken", base)), 5).await;
        let result = relay.send(send("s4", "hola")).await;
        assert!(matches!(result, Err(ChatError::Upstream(502))));

        // the user message is kept even when the relay fails
        let transcript = relay.transcript("s4").await.unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_relay_timeout_returns_canned_reply() {
        let base = spawn_webhook().await;
        let relay = setup_relay(Some(format!("{}/slow", base)), 1).await;
        let reply = relay.send(send("s5", "hola")).await.unwrap();
        assert_eq!(reply, ChatConfig::default().timeout_message);
    }

    #[tokio::test]
    async fn test_validation_and_rate_limit() {
        let relay = setup_relay(None, 10).await;
        assert!(matches!(
            relay.send(SendMessageInput::default()).await,
            Err(ChatError::MissingFields)
        ));
        assert!(matches!(relay.send(send("s6", "   ")).await, Err(ChatError::MissingFields)));
        assert!(matches!(relay.transcript(" ").await, Err(ChatError::MissingFields)));

        for _ in 0..3 {
            relay.send(send("s6", "hola")).await.unwrap();
        }
        assert!(matches!(relay.send(send("s6", "hola")).await, Err(ChatError::RateLimited)));
        // other sessions are unaffected
        assert!(relay.send(send("s7", "hola")).await.is_ok());

        let sessions = relay.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
    }
}
