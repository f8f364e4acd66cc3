//! Support chat transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    /// Client-visible id, `chat_<millis>_<suffix>` when generated here
    pub id: String,
    pub user_id: Option<i64>,
    /// Where the conversation started, e.g. `web`
    pub channel: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Session summary for the admin transcript list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    #[serde(flatten)]
    pub session: ChatSession,
    pub message_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub sender: ChatSender,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Assistant,
    System,
}

impl fmt::Display for ChatSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatSender::User => write!(f, "user"),
            ChatSender::Assistant => write!(f, "assistant"),
            ChatSender::System => write!(f, "system"),
        }
    }
}

impl FromStr for ChatSender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatSender::User),
            "assistant" => Ok(ChatSender::Assistant),
            "system" => Ok(ChatSender::System),
            _ => Err(anyhow::anyhow!("Invalid chat sender: {}", s)),
        }
    }
}
