#[cfg(test)]
pub mod fake;
mod openrouter;

pub use openrouter::OpenRouterProvider;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One non-streamed chat completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Preferred model first; later entries are fallbacks for the host to route to.
    pub models: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Whether calls can succeed at all (e.g. a credential is configured).
    fn is_configured(&self) -> bool {
        true
    }

    // Returns the text of the first choice. Absent or blank content is an error.
    async fn generate(&self, request: &CompletionRequest) -> Result<String>;
}

/// Parse a model reply that should be a bare JSON object. A surrounding
/// markdown code fence is tolerated.
pub fn parse_json_object(content: &str) -> Result<Map<String, Value>> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("expected a JSON object, got {}", json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// String field of a parsed reply, if present and non-blank.
pub fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// String items of an array field; anything else reads as empty.
pub fn str_list_field(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object() {
        let map = parse_json_object(r#" {"severity": "high"} "#).unwrap();
        assert_eq!(str_field(&map, "severity").as_deref(), Some("high"));
    }

    #[test]
    fn strips_markdown_fence() {
        let map = parse_json_object("```json\n{\"signals\": [\"a\", 3, \"b\"]}\n```").unwrap();
        assert_eq!(str_list_field(&map, "signals"), vec!["a", "b"]);

        let plain = parse_json_object("```\n{\"x\": \"y\"}\n```").unwrap();
        assert_eq!(str_field(&plain, "x").as_deref(), Some("y"));
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("I think it was the provider.").is_err());
        assert!(parse_json_object("").is_err());
    }

    #[test]
    fn missing_or_mistyped_fields_read_as_empty() {
        let map = parse_json_object(r#"{"signals": "not a list", "rootCause": "  "}"#).unwrap();
        assert!(str_list_field(&map, "signals").is_empty());
        assert!(str_field(&map, "rootCause").is_none());
        assert!(str_field(&map, "absent").is_none());
    }
}
