use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    CrisisDetection,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::CrisisDetection => "crisis_detection",
        }
    }
}

pub const ACTION_CRISIS_RESOURCES: &str = "provided_crisis_resources";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SafetyLogEntry {
    pub id: Uuid,
    pub session_id: String,
    pub trigger_type: String,
    pub message: String,
    pub action_taken: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSafetyLog {
    pub session_id: String,
    pub trigger_type: TriggerType,
    pub message: String,
    pub action_taken: String,
}

impl NewSafetyLog {
    pub fn crisis(session_id: &str, message: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            trigger_type: TriggerType::CrisisDetection,
            message: message.to_string(),
            action_taken: ACTION_CRISIS_RESOURCES.to_string(),
        }
    }
}
