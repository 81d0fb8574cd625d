//! What the assistant may describe: services, self-assessments, site pages
//! and the conditions the practice treats. Loaded from TOML when
//! `prompt.catalog_path` is set, otherwise the built-in catalog.

use std::path::Path;

use serde::Deserialize;

use crate::error::HavenError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: Option<String>,
    pub summary: Option<String>,
}

impl CatalogEntry {
    fn new(name: &str, path: &str, summary: &str) -> Self {
        Self {
            name: name.to_string(),
            path: Some(path.to_string()),
            summary: Some(summary.to_string()),
        }
    }

    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            summary: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Catalog {
    pub services: Vec<CatalogEntry>,
    pub assessments: Vec<CatalogEntry>,
    pub pages: Vec<CatalogEntry>,
    pub conditions: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            services: vec![
                CatalogEntry::new(
                    "Individual Therapy",
                    "/services/individual-therapy",
                    "One-on-one sessions with a licensed therapist, in person or via telehealth",
                ),
                CatalogEntry::new(
                    "Couples Therapy",
                    "/services/couples-therapy",
                    "Support for communication, conflict and connection in relationships",
                ),
                CatalogEntry::new(
                    "Teen Therapy",
                    "/services/teen-therapy",
                    "Therapy for adolescents ages 13-17 with family involvement as appropriate",
                ),
                CatalogEntry::new(
                    "EMDR Therapy",
                    "/services/emdr",
                    "Eye Movement Desensitization and Reprocessing for trauma and distressing memories",
                ),
                CatalogEntry::new(
                    "Telehealth",
                    "/services/telehealth",
                    "Secure video sessions for clients anywhere in the state",
                ),
            ],
            assessments: vec![
                CatalogEntry::new(
                    "Anxiety Self-Assessment (GAD-7)",
                    "/assessments/anxiety",
                    "Seven questions about anxiety symptoms over the last two weeks",
                ),
                CatalogEntry::new(
                    "Depression Self-Assessment (PHQ-9)",
                    "/assessments/depression",
                    "Nine questions about mood and depressive symptoms",
                ),
                CatalogEntry::new(
                    "PTSD Screening (PC-PTSD-5)",
                    "/assessments/ptsd",
                    "Brief screen for trauma-related symptoms",
                ),
            ],
            pages: vec![
                CatalogEntry::new("Get Started", "/get-started", "Intake form for new clients"),
                CatalogEntry::new("Contact", "/contact", "Schedule a free 15-minute consultation"),
                CatalogEntry::new("Our Team", "/team", "Therapist bios and specialties"),
                CatalogEntry::new("Insurance & Fees", "/insurance", "Accepted plans, self-pay rates and superbills"),
                CatalogEntry::new("FAQ", "/faq", "Common questions about starting therapy"),
            ],
            conditions: [
                "Anxiety",
                "Depression",
                "Trauma and PTSD",
                "Grief and loss",
                "Relationship issues",
                "Stress and burnout",
                "Life transitions",
                "Obsessive-compulsive disorder",
                "Panic attacks",
                "Self-esteem",
            ]
            .into_iter()
            .map(CatalogEntry::named)
            .collect(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HavenError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|e| HavenError::DataFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: Option<&str>) -> Result<Self, HavenError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.assessments.is_empty()
            && self.pages.is_empty()
            && self.conditions.is_empty()
    }

    /// Render as the catalog section of the system prompt. Empty groups are omitted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (heading, entries) in [
            ("SERVICES", &self.services),
            ("SELF-ASSESSMENTS", &self.assessments),
            ("SITE PAGES", &self.pages),
            ("CONDITIONS WE TREAT", &self.conditions),
        ] {
            if entries.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("{heading}:\n"));
            for entry in entries {
                out.push_str("- ");
                out.push_str(&entry.name);
                if let Some(path) = &entry.path {
                    out.push_str(&format!(" ({path})"));
                }
                if let Some(summary) = &entry.summary {
                    out.push_str(&format!(": {summary}"));
                }
                out.push('\n');
            }
        }
        out
    }
}
