pub mod content;
pub mod safety;
pub mod session;

pub use content::ContentCacheRow;
pub use safety::{NewSafetyLog, SafetyLogEntry, TriggerType};
pub use session::{ChatSession, ChatTurn, Role, SessionUpdate};
