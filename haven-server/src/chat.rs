//! Chat request handler.
//!
//! A message first passes the crisis gate. A match is logged to
//! `safety_logs` and answered with the fixed resource message; nothing else
//! runs. Every other message is answered by the completion API with the
//! session's history as context, and the user/assistant turn pair is
//! appended to the session under an optimistic version check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use haven_core::catalog::Catalog;
use haven_core::completion::{CompletionBackend, CompletionError};
use haven_core::config::{ChatConfig, HavenConfig, PromptConfig};
use haven_core::models::{ChatSession, ChatTurn, NewSafetyLog, SessionUpdate};
use haven_core::prompt::{build_messages, build_system_prompt, load_persona};
use haven_core::reply::parse_reply;
use haven_core::safety::CrisisDetector;
use haven_core::store::{SessionStore, StoreError};
use haven_core::HavenError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Crisis { content: String },
    Reply { content: String, degraded: bool },
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: AssistantMessage,
    pub is_crisis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session: Option<bool>,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        match outcome {
            ChatOutcome::Crisis { content } => Self {
                response: AssistantMessage {
                    role: "assistant",
                    content,
                },
                is_crisis: true,
                end_session: Some(true),
            },
            ChatOutcome::Reply { content, .. } => Self {
                response: AssistantMessage {
                    role: "assistant",
                    content,
                },
                is_crisis: false,
                end_session: None,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Session {session_id} kept changing; gave up after {attempts} save attempts")]
    SaveConflict { session_id: String, attempts: u32 },
}

pub struct ChatService {
    store: Arc<dyn SessionStore>,
    completion: Arc<dyn CompletionBackend>,
    detector: CrisisDetector,
    catalog: Catalog,
    persona: String,
    prompt: PromptConfig,
    chat: ChatConfig,
}

impl ChatService {
    /// Build the service, loading the keyword list, catalog and persona
    /// from the paths in `config` (built-ins when unset).
    pub fn new(
        store: Arc<dyn SessionStore>,
        completion: Arc<dyn CompletionBackend>,
        config: &HavenConfig,
    ) -> Result<Self, HavenError> {
        let detector = CrisisDetector::load(config.safety.keywords_path.as_deref())?;
        let catalog = Catalog::load(config.prompt.catalog_path.as_deref())?;
        let persona = load_persona(config.prompt.persona_path.as_deref())?;

        tracing::info!(
            keywords_version = detector.version(),
            keywords = detector.keyword_count(),
            store = store.name(),
            model = completion.model(),
            "Chat service ready"
        );

        Ok(Self {
            store,
            completion,
            detector,
            catalog,
            persona,
            prompt: config.prompt.clone(),
            chat: config.chat.clone(),
        })
    }

    pub fn with_detector(mut self, detector: CrisisDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    fn validate(&self, request: &ChatRequest) -> Result<(), ChatError> {
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(ChatError::InvalidRequest("sessionId must not be empty".to_string()));
        }
        if session_id.chars().count() > self.chat.max_session_id_len {
            return Err(ChatError::InvalidRequest(format!(
                "sessionId exceeds {} characters",
                self.chat.max_session_id_len
            )));
        }
        Ok(())
    }

    pub async fn handle(
        &self,
        request: &ChatRequest,
        client_ip: &str,
    ) -> Result<ChatOutcome, ChatError> {
        let received_at = Utc::now();
        let session_id = request.session_id.as_str();

        // The gate runs before any request validation: a crisis message is
        // always answered, whatever the sessionId looks like.
        if let Some(keyword) = self.detector.detect(&request.message) {
            tracing::warn!(session_id, client_ip, keyword, "Crisis keyword detected");
            self.store
                .log_safety_incident(&NewSafetyLog::crisis(session_id, &request.message))
                .await?;
            return Ok(ChatOutcome::Crisis {
                content: self.detector.response().to_string(),
            });
        }

        self.validate(request)?;
        let session = self.store.load_session(session_id).await?;
        let history: &[ChatTurn] = session.as_ref().map(ChatSession::turns).unwrap_or(&[]);

        let content_rows = match self
            .store
            .fetch_content_cache(self.prompt.content_cache_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Content cache unavailable, continuing without it");
                Vec::new()
            }
        };

        let system_prompt = build_system_prompt(
            &self.persona,
            &self.catalog,
            &content_rows,
            self.prompt.content_chars_per_row,
        );
        let messages = build_messages(&system_prompt, history, &request.message);

        tracing::debug!(
            session_id,
            history = history.len(),
            content_rows = content_rows.len(),
            "Calling completion API"
        );
        let raw = self.completion.complete(&messages).await?;

        let parsed = parse_reply(&raw);
        let content = parsed.render();
        let degraded = parsed.is_fallback();

        let turns = [
            ChatTurn::user(request.message.clone(), received_at),
            ChatTurn::assistant(content.clone(), Utc::now()),
        ];
        self.append_turns(session, session_id, &turns, client_ip)
            .await?;

        tracing::info!(session_id, degraded, "Chat reply sent");
        Ok(ChatOutcome::Reply { content, degraded })
    }

    /// Append `turns` to the stored session. On a version conflict the row is
    /// reloaded and the same turns are appended to the fresh history.
    async fn append_turns(
        &self,
        mut session: Option<ChatSession>,
        session_id: &str,
        turns: &[ChatTurn],
        client_ip: &str,
    ) -> Result<(), ChatError> {
        let attempts = self.chat.max_save_attempts.max(1);

        for attempt in 1..=attempts {
            let (mut messages, expected_version) = match &session {
                Some(s) => (s.turns().to_vec(), Some(s.version)),
                None => (Vec::new(), None),
            };
            messages.extend_from_slice(turns);

            let update = SessionUpdate {
                session_id: session_id.to_string(),
                messages,
                ip_address: client_ip.to_string(),
                last_activity: last_activity(turns),
                expected_version,
            };

            match self.store.save_session(&update).await {
                Ok(()) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::warn!(session_id, attempt, "Session changed concurrently, reloading");
                    session = self.store.load_session(session_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ChatError::SaveConflict {
            session_id: session_id.to_string(),
            attempts,
        })
    }
}

fn last_activity(turns: &[ChatTurn]) -> DateTime<Utc> {
    turns.last().map(|t| t.timestamp).unwrap_or_else(Utc::now)
}
