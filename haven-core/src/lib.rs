pub mod catalog;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prompt;
pub mod reply;
pub mod safety;
pub mod store;

pub use catalog::Catalog;
pub use completion::{
    CompletionBackend, CompletionError, CompletionSettings, OpenAiCompletionClient,
};
pub use config::HavenConfig;
pub use error::HavenError;
pub use prompt::PromptMessage;
pub use reply::{CallToAction, ParsedReply, StructuredReply};
pub use safety::CrisisDetector;
pub use store::{MemoryStore, PgSessionStore, SessionStore, StoreError};
