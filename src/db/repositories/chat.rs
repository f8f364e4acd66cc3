//! Chat transcript repository

use super::{decode_enum, decode_json, encode_json, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{ChatMessage, ChatSender, ChatSession, ChatSessionSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession>;

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>>;

    /// Sessions newest first with message counts
    async fn list_sessions(&self) -> Result<Vec<ChatSessionSummary>>;

    async fn add_message(
        &self,
        session_id: &str,
        sender: ChatSender,
        message: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<ChatMessage>;

    /// Transcript in chronological order
    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    async fn count_sessions(&self) -> Result<i64>;
}

pub struct SqlxChatRepository {
    pool: DynDatabasePool,
}

impl SqlxChatRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChatRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(ChatSession, |row| {
    Ok(ChatSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        channel: row.try_get("channel")?,
        metadata: decode_json(row.try_get("metadata")?),
        created_at: row.try_get("created_at")?,
    })
});

impl_from_row!(ChatSessionSummary, |row| {
    Ok(ChatSessionSummary {
        session: sqlx::FromRow::from_row(row)?,
        message_count: row.try_get("message_count")?,
        last_message_at: row.try_get("last_message_at")?,
    })
});

impl_from_row!(ChatMessage, |row| {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        sender: decode_enum(row.try_get("sender")?)?,
        message: row.try_get("message")?,
        metadata: decode_json(row.try_get("metadata")?),
        created_at: row.try_get("created_at")?,
    })
});

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession> {
        let metadata = encode_json(session.metadata.as_ref());
        on_backend!(self.pool, p => sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, channel, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.channel)
        .bind(&metadata)
        .bind(session.created_at)
        .execute(p)
        .await
        .map(|_| ()))
        .context("Failed to create chat session")?;

        Ok(session.clone())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let session = on_backend!(self.pool, p => sqlx::query_as::<_, ChatSession>(
            "SELECT id, user_id, channel, metadata, created_at FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(p)
        .await)
        .context("Failed to get chat session")?;
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<ChatSessionSummary>> {
        let sessions = on_backend!(self.pool, p => sqlx::query_as::<_, ChatSessionSummary>(
            r#"
            SELECT s.id, s.user_id, s.channel, s.metadata, s.created_at,
                   COUNT(m.id) AS message_count, MAX(m.created_at) AS last_message_at
            FROM chat_sessions s
            LEFT JOIN chat_messages m ON m.session_id = s.id
            GROUP BY s.id, s.user_id, s.channel, s.metadata, s.created_at
            ORDER BY s.created_at DESC
            "#,
        )
        .fetch_all(p)
        .await)
        .context("Failed to list chat sessions")?;
        Ok(sessions)
    }

    async fn add_message(
        &self,
        session_id: &str,
        sender: ChatSender,
        message: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<ChatMessage> {
        let now = Utc::now();
        let sender_str = sender.to_string();
        let metadata_str = encode_json(metadata);

        let id = on_backend!(self.pool, p => sqlx::query(
            "INSERT INTO chat_messages (session_id, sender, message, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(&sender_str)
        .bind(message)
        .bind(&metadata_str)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to save chat message")?;

        Ok(ChatMessage {
            id,
            session_id: session_id.to_string(),
            sender,
            message: message.to_string(),
            metadata: metadata.cloned(),
            created_at: now,
        })
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let messages = on_backend!(self.pool, p => sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, sender, message, metadata, created_at
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(p)
        .await)
        .context("Failed to load chat transcript")?;
        Ok(messages)
    }

    async fn count_sessions(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_sessions")
            .fetch_one(p)
            .await)
        .context("Failed to count chat sessions")?;
        Ok(count)
    }
}
