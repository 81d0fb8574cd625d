//! System prompt and message sequence assembly.

use std::path::Path;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::HavenError;
use crate::models::{ChatTurn, ContentCacheRow, Role};

pub const PERSONA_INSTRUCTIONS: &str = "You are the website assistant for Haven Counseling, a group therapy practice. \
You help visitors understand our services, find the right page on our site, and take the next step toward care.

Rules:
- You are not a therapist and you do not provide therapy, diagnosis, or medical advice.
- Keep answers warm, brief (under 150 words), and in plain language.
- Only describe services, assessments, pages and conditions listed in the catalog below. If something is not listed, say you are not sure and suggest contacting the practice.
- Never invent prices, insurance plans, therapist names, or availability.
- If a visitor mentions thoughts of suicide or self-harm, urge them to call or text 988 or call 911.

Respond with JSON only: {\"answer\": string, \"cta\": one of GET_STARTED | SCHEDULE_CONSULTATION | TAKE_ASSESSMENT | VIEW_SERVICES | NONE, \"sources\": array of site paths you relied on}.
Choose a cta only when it naturally fits the visitor's question; otherwise use NONE.";

/// One message of the completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Load persona text from `path` when configured, else the built-in text.
pub fn load_persona(path: Option<&str>) -> Result<String, HavenError> {
    match path {
        Some(p) => Ok(std::fs::read_to_string(Path::new(p))?.trim().to_string()),
        None => Ok(PERSONA_INSTRUCTIONS.to_string()),
    }
}

/// Truncate to at most `max_chars` characters, never splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn render_content_row(row: &ContentCacheRow, max_chars: usize) -> String {
    let title = row.title.as_deref().unwrap_or(&row.url);
    let body = row
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(row.content.as_deref())
        .unwrap_or("");
    let text = format!("{} ({}): {}", title, row.url, body.trim());
    format!("- {}", truncate_chars(text.trim_end_matches(&[' ', ':'][..]), max_chars))
}

pub fn build_system_prompt(
    persona: &str,
    catalog: &Catalog,
    content: &[ContentCacheRow],
    chars_per_row: usize,
) -> String {
    let mut prompt = String::from(persona.trim_end());

    if !catalog.is_empty() {
        prompt.push_str("\n\n# CATALOG\n");
        prompt.push_str(&catalog.render());
    }

    if !content.is_empty() {
        prompt.push_str("\n# SITE CONTENT\n");
        for row in content {
            prompt.push_str(&render_content_row(row, chars_per_row));
            prompt.push('\n');
        }
    }

    prompt
}

/// System prompt, then stored history in order, then the new user message.
pub fn build_messages(
    system_prompt: &str,
    history: &[ChatTurn],
    user_message: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::new(Role::System, system_prompt));
    messages.extend(
        history
            .iter()
            .map(|turn| PromptMessage::new(turn.role, turn.content.clone())),
    );
    messages.push(PromptMessage::new(Role::User, user_message));
    messages
}
