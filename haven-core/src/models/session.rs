use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One stored turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub session_id: String,
    pub messages: Json<Vec<ChatTurn>>,
    pub context: serde_json::Value,
    pub ip_address: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub version: i64,
}

impl ChatSession {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.messages.0
    }
}

/// Write request for a session row. `expected_version` is `None` when the
/// caller saw no row and intends to create it.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub session_id: String,
    pub messages: Vec<ChatTurn>,
    pub ip_address: String,
    pub last_activity: DateTime<Utc>,
    pub expected_version: Option<i64>,
}
