//! Parsing and rendering of the model's structured reply.
//!
//! The completion API is asked for `{answer, cta, sources}`. When the content
//! does not parse as that shape, the raw text is used as the reply and the
//! result is tagged [`ParsedReply::RawFallback`] so callers can tell a
//! degraded reply from a validated one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallToAction {
    GetStarted,
    ScheduleConsultation,
    TakeAssessment,
    ViewServices,
    None,
}

impl CallToAction {
    pub const ALL: [CallToAction; 5] = [
        CallToAction::GetStarted,
        CallToAction::ScheduleConsultation,
        CallToAction::TakeAssessment,
        CallToAction::ViewServices,
        CallToAction::None,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            CallToAction::GetStarted => "GET_STARTED",
            CallToAction::ScheduleConsultation => "SCHEDULE_CONSULTATION",
            CallToAction::TakeAssessment => "TAKE_ASSESSMENT",
            CallToAction::ViewServices => "VIEW_SERVICES",
            CallToAction::None => "NONE",
        }
    }

    /// Fixed text appended after the answer.
    pub fn suffix(&self) -> &'static str {
        match self {
            CallToAction::GetStarted => {
                "\n\nReady to take the next step? [Get started with our intake form](/get-started)"
            }
            CallToAction::ScheduleConsultation => {
                "\n\nWould you like to talk with someone? [Schedule a free consultation](/contact)"
            }
            CallToAction::TakeAssessment => {
                "\n\nCurious where you stand? [Take a free self-assessment](/assessments)"
            }
            CallToAction::ViewServices => "\n\nLearn more about [our services](/services)",
            CallToAction::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReply {
    pub answer: String,
    pub cta: CallToAction,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Structured(StructuredReply),
    RawFallback(String),
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    match serde_json::from_str::<StructuredReply>(raw) {
        Ok(reply) => ParsedReply::Structured(reply),
        Err(e) => {
            tracing::warn!(error = %e, "Model reply did not match schema, using raw content");
            ParsedReply::RawFallback(raw.to_string())
        }
    }
}

impl ParsedReply {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ParsedReply::RawFallback(_))
    }

    /// Display text for the chat widget.
    pub fn render(&self) -> String {
        match self {
            ParsedReply::RawFallback(raw) => raw.clone(),
            ParsedReply::Structured(reply) => {
                let mut out = reply.answer.clone();
                out.push_str(reply.cta.suffix());

                let sources: Vec<&str> = reply
                    .sources
                    .iter()
                    .flatten()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !sources.is_empty() {
                    out.push_str("\n\nSources:");
                    for source in sources {
                        out.push_str("\n- ");
                        out.push_str(source);
                    }
                }
                out
            }
        }
    }
}

/// JSON schema sent as the completion API's `response_format`.
pub fn response_schema() -> serde_json::Value {
    let tags: Vec<&str> = CallToAction::ALL.iter().map(CallToAction::tag).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "cta": { "type": "string", "enum": tags },
            "sources": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["answer", "cta", "sources"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_started_appends_intake_link() {
        let parsed = parse_reply(r#"{"answer":"We can help with anxiety.","cta":"GET_STARTED","sources":[]}"#);
        assert!(!parsed.is_fallback());
        let rendered = parsed.render();
        assert!(rendered.starts_with("We can help with anxiety."));
        assert!(rendered.contains("[Get started with our intake form](/get-started)"));
    }

    #[test]
    fn test_none_appends_nothing() {
        let parsed = parse_reply(r#"{"answer":"Hello there.","cta":"NONE"}"#);
        assert_eq!(parsed.render(), "Hello there.");
    }

    #[test]
    fn test_sources_rendered_as_bullets() {
        let parsed = parse_reply(
            r#"{"answer":"See our EMDR page.","cta":"VIEW_SERVICES","sources":["/services/emdr"," ","/faq"]}"#,
        );
        assert_eq!(
            parsed.render(),
            "See our EMDR page.\n\nLearn more about [our services](/services)\n\nSources:\n- /services/emdr\n- /faq"
        );
    }

    #[test]
    fn test_plain_text_falls_back_verbatim() {
        let raw = "Sorry, I can only answer questions about our practice.";
        let parsed = parse_reply(raw);
        assert_eq!(parsed, ParsedReply::RawFallback(raw.to_string()));
        assert_eq!(parsed.render(), raw);
    }

    #[test]
    fn test_unknown_cta_falls_back() {
        let raw = r#"{"answer":"Hi","cta":"BUY_NOW","sources":[]}"#;
        let parsed = parse_reply(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.render(), raw);
    }

    #[test]
    fn test_missing_answer_falls_back() {
        assert!(parse_reply(r#"{"cta":"NONE"}"#).is_fallback());
    }

    #[test]
    fn test_every_cta_but_none_has_a_link() {
        for cta in CallToAction::ALL {
            if cta == CallToAction::None {
                assert!(cta.suffix().is_empty());
            } else {
                assert!(cta.suffix().contains("](/"), "{} has no link", cta.tag());
            }
        }
    }

    #[test]
    fn test_schema_enumerates_all_tags() {
        let schema = response_schema();
        let tags = schema["properties"]["cta"]["enum"].as_array().unwrap();
        assert_eq!(tags.len(), CallToAction::ALL.len());
        assert!(tags.contains(&serde_json::json!("GET_STARTED")));
        assert_eq!(schema["additionalProperties"], false);
    }
}
