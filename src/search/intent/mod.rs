
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, ChatModel};

const INTENT_TEMPERATURE: f32 = 0.0;

const INTENT_INSTRUCTION: &str = r#"You extract laptop shopping constraints from a user's request.
Answer with a single JSON object and nothing else, shaped like:
{"important_attributes": {"price_under": 1000, "price_above": 500, "lightweight": true, "brand": "Dell", "model": "XPS", "use_case": "gaming"}}
Rules:
- Include only the attributes the request actually mentions.
- Prices are plain numbers in euros.
- "lightweight" is true only when the user asks for a light or portable laptop.
- "use_case" is one of: gaming, student, office, video editing.
- If nothing applies, answer {"important_attributes": {}}."#;

/// Structured constraints read from a free-text query. `None` means the
/// query placed no constraint on that attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryIntent {
    pub price_under: Option<f64>,
    pub price_above: Option<f64>,
    pub lightweight: Option<bool>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub use_case: Option<String>,
}

impl QueryIntent {
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Error)]
pub enum IntentParseError {
    #[error("Language model returned an empty response")]
    Empty,
    #[error("Language model response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Language model response is not a JSON object")]
    NotAnObject,
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Parsed(QueryIntent),
    /// Extraction failed; the search proceeds without filters
    Fallback { reason: String },
}

impl IntentOutcome {
    /// The intent to filter with; empty on fallback
    #[inline]
    pub fn intent(&self) -> QueryIntent {
        match self {
            Self::Parsed(intent) => intent.clone(),
            Self::Fallback { .. } => QueryIntent::default(),
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Remove a surrounding ``` fence and its language tag, if present
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Language tag runs up to the first whitespace
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn number_field(attributes: &Map<String, Value>, key: &str) -> Option<f64> {
    attributes.get(key).and_then(Value::as_f64)
}

fn text_field(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a language model reply into a [`QueryIntent`].
///
/// Values of the wrong JSON type count as absent. A missing or non-object
/// `important_attributes` yields an empty intent.
#[inline]
pub fn parse_intent(raw: &str) -> Result<QueryIntent, IntentParseError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(IntentParseError::Empty);
    }

    let value: Value = serde_json::from_str(body)?;
    let root = value.as_object().ok_or(IntentParseError::NotAnObject)?;

    let Some(attributes) = root.get("important_attributes").and_then(Value::as_object) else {
        debug!("No important_attributes object in intent response");
        return Ok(QueryIntent::default());
    };

    Ok(QueryIntent {
        price_under: number_field(attributes, "price_under"),
        price_above: number_field(attributes, "price_above"),
        lightweight: attributes.get("lightweight").and_then(Value::as_bool),
        brand: text_field(attributes, "brand"),
        model: text_field(attributes, "model"),
        use_case: text_field(attributes, "use_case"),
    })
}

/// Asks the chat model which constraints a query expresses
#[derive(Clone)]
pub struct IntentExtractor {
    chat: Arc<dyn ChatModel>,
}

impl IntentExtractor {
    #[inline]
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// One chat request per call. Request and parse failures both become
    /// [`IntentOutcome::Fallback`].
    #[inline]
    pub fn extract(&self, query: &str) -> IntentOutcome {
        let messages = [
            ChatMessage::system(INTENT_INSTRUCTION),
            ChatMessage::user(query),
        ];

        let raw = match self.chat.complete(&messages, Some(INTENT_TEMPERATURE)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Intent extraction request failed: {:#}", e);
                return IntentOutcome::Fallback {
                    reason: format!("request failed: {e:#}"),
                };
            }
        };

        match parse_intent(&raw) {
            Ok(intent) => {
                debug!("Extracted intent: {:?}", intent);
                IntentOutcome::Parsed(intent)
            }
            Err(e) => {
                warn!("Could not parse intent response: {}", e);
                IntentOutcome::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }
}
