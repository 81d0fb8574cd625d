use serde::{Deserialize, Serialize};

/// A crawled site page from the `content_cache` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentCacheRow {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}
