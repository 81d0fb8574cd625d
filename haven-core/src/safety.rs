//! Crisis keyword gate.
//!
//! A message is treated as a crisis when its lower-cased text contains any
//! configured keyword as a substring. No tokenisation, stemming or negation
//! handling is attempted: "I don't want to die" matches `want to die`.
//!
//! The keyword list is data, not code. Deployments point
//! `safety.keywords_path` at a versioned TOML file:
//!
//! ```toml
//! version = "2026-10-01"
//! keywords = ["suicide", "kill myself"]
//! response = "optional override of the resource message"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::HavenError;

pub const BUILTIN_KEYWORDS_VERSION: &str = "builtin-1";

pub const DEFAULT_CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "want to die",
    "wanna die",
    "better off dead",
    "take my own life",
    "hurt myself",
    "hurting myself",
    "self harm",
    "self-harm",
    "cut myself",
    "cutting myself",
    "no reason to live",
    "overdose",
];

pub const CRISIS_RESPONSE: &str = "I'm really concerned about what you've shared, and I want to make sure you get support right away. \
I'm an automated assistant and can't provide crisis care, but people are available to help you right now:\n\n\
- Call or text 988 to reach the 988 Suicide & Crisis Lifeline (24/7, free and confidential)\n\
- Text HOME to 741741 to reach the Crisis Text Line\n\
- If you are in immediate danger, call 911 or go to your nearest emergency room\n\n\
You don't have to go through this alone. Please reach out to one of these resources now.";

#[derive(Debug, Deserialize)]
struct KeywordFile {
    version: String,
    keywords: Vec<String>,
    response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CrisisDetector {
    version: String,
    keywords: Vec<String>,
    response: String,
}

impl Default for CrisisDetector {
    fn default() -> Self {
        Self {
            version: BUILTIN_KEYWORDS_VERSION.to_string(),
            keywords: DEFAULT_CRISIS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            response: CRISIS_RESPONSE.to_string(),
        }
    }
}

impl CrisisDetector {
    /// Build a detector from a keyword list. Keywords are lower-cased and
    /// trimmed; blank entries are dropped. An empty result is refused.
    pub fn new(
        version: impl Into<String>,
        keywords: impl IntoIterator<Item = String>,
        response: Option<String>,
    ) -> Result<Self, HavenError> {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(HavenError::Safety(
                "crisis keyword list is empty".to_string(),
            ));
        }

        Ok(Self {
            version: version.into(),
            keywords,
            response: response.unwrap_or_else(|| CRISIS_RESPONSE.to_string()),
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, HavenError> {
        let file: KeywordFile =
            toml::from_str(contents).map_err(|e| HavenError::Safety(e.to_string()))?;
        Self::new(file.version, file.keywords, file.response)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HavenError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|e| HavenError::DataFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` when configured, else the built-in list.
    pub fn load(path: Option<&str>) -> Result<Self, HavenError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Returns the first keyword contained in `message`, if any.
    pub fn detect(&self, message: &str) -> Option<&str> {
        let lowered = message.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_crisis(&self, message: &str) -> bool {
        self.detect(message).is_some()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }
}
