use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::models::{ChatSession, ContentCacheRow, NewSafetyLog, SafetyLogEntry, SessionUpdate};

/// In-process store with the same version semantics as [`super::PgSessionStore`].
/// Backs `--memory-store` development runs and the handler tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, ChatSession>>,
    safety_logs: Mutex<Vec<SafetyLogEntry>>,
    content: Vec<ContentCacheRow>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: Vec<ContentCacheRow>) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    pub fn session(&self, session_id: &str) -> Option<ChatSession> {
        lock(&self.sessions).get(session_id).cloned()
    }

    pub fn safety_logs(&self) -> Vec<SafetyLogEntry> {
        lock(&self.safety_logs).clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.session(session_id))
    }

    async fn save_session(&self, update: &SessionUpdate) -> Result<(), StoreError> {
        let mut sessions = lock(&self.sessions);
        let current = sessions.get(&update.session_id).map(|s| s.version);

        let next_version = match (current, update.expected_version) {
            (None, None) => 1,
            (Some(found), Some(expected)) if found == expected => found + 1,
            _ => {
                return Err(StoreError::VersionConflict {
                    session_id: update.session_id.clone(),
                })
            }
        };

        let context = sessions
            .get(&update.session_id)
            .map(|s| s.context.clone())
            .unwrap_or_else(|| serde_json::json!({}));

        sessions.insert(
            update.session_id.clone(),
            ChatSession {
                session_id: update.session_id.clone(),
                messages: Json(update.messages.clone()),
                context,
                ip_address: Some(update.ip_address.clone()),
                last_activity: update.last_activity,
                version: next_version,
            },
        );
        Ok(())
    }

    async fn log_safety_incident(&self, entry: &NewSafetyLog) -> Result<(), StoreError> {
        lock(&self.safety_logs).push(SafetyLogEntry {
            id: Uuid::new_v4(),
            session_id: entry.session_id.clone(),
            trigger_type: entry.trigger_type.as_str().to_string(),
            message: entry.message.clone(),
            action_taken: entry.action_taken.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn fetch_content_cache(&self, limit: i64) -> Result<Vec<ContentCacheRow>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.content.iter().take(limit).cloned().collect())
    }

    async fn health(&self) -> Result<String, StoreError> {
        Ok("in-memory".to_string())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
