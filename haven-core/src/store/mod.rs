//! Session persistence for the chat handler.
//!
//! Three logical tables back the handler: `chat_sessions` (read-modify-write,
//! versioned), `safety_logs` (append-only) and `content_cache` (read-only).
//! Session writes carry the version the caller read; a mismatch is reported
//! as [`StoreError::VersionConflict`] instead of silently overwriting a
//! concurrent writer's turns.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSessionStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatSession, ContentCacheRow, NewSafetyLog, SessionUpdate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session {session_id} was modified concurrently")]
    VersionConflict { session_id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError>;

    /// Create or replace a session's turn list, guarded by `expected_version`.
    async fn save_session(&self, update: &SessionUpdate) -> Result<(), StoreError>;

    async fn log_safety_incident(&self, entry: &NewSafetyLog) -> Result<(), StoreError>;

    async fn fetch_content_cache(&self, limit: i64) -> Result<Vec<ContentCacheRow>, StoreError>;

    /// Backend description for health reporting (e.g. the PostgreSQL version).
    async fn health(&self) -> Result<String, StoreError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}
