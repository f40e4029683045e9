use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, CompletionRequest, LlmProvider};

#[derive(Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    models: Option<&'a [String]>,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
}

#[derive(Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessageOwned,
}

#[derive(Deserialize)]
struct OpenRouterMessageOwned {
    #[serde(default)]
    content: Option<serde_json::Value>,
}

/// OpenAI-compatible chat completions against OpenRouter (or any host that
/// speaks the same wire format).
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn provider_id(&self) -> &str {
        "openrouter"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        if !self.is_configured() {
            return Err(anyhow!("OpenRouter API key is not configured"));
        }
        let model = request
            .models
            .first()
            .ok_or_else(|| anyhow!("Completion request names no model"))?;

        let req = OpenRouterRequest {
            model,
            models: (request.models.len() > 1).then_some(request.models.as_slice()),
            messages: &request.messages,
            stream: false,
            temperature: request.temperature,
        };

        debug!(
            "Sending completion to {} (models={:?}, messages={})",
            self.base_url,
            request.models,
            request.messages.len()
        );
        let res = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "OpenRouter API Error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: OpenRouterResponse = res.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        match content {
            Some(serde_json::Value::String(text)) if !text.trim().is_empty() => Ok(text),
            _ => Err(anyhow!("OpenRouter returned no text content")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(models: &[&str]) -> CompletionRequest {
        CompletionRequest {
            models: models.iter().map(|m| m.to_string()).collect(),
            messages: vec![ChatMessage::user("ping")],
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let provider = OpenRouterProvider::new(
            "  ".to_string(),
            "http://127.0.0.1:9/unreachable".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!provider.is_configured());
        let err = provider.generate(&request(&["openai/gpt-4o-mini"])).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn empty_model_list_is_rejected() {
        let provider = OpenRouterProvider::new(
            "sk-test".to_string(),
            "http://127.0.0.1:9/unreachable".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(provider.generate(&request(&[])).await.is_err());
    }

    #[test]
    fn fallback_models_are_sent_only_when_listed() {
        let models = vec!["a/one".to_string(), "b/two".to_string()];
        let messages = vec![ChatMessage::system("s")];
        let body = serde_json::to_value(OpenRouterRequest {
            model: &models[0],
            models: Some(models.as_slice()),
            messages: &messages,
            stream: false,
            temperature: 0.2,
        })
        .unwrap();
        assert_eq!(body["model"], "a/one");
        assert_eq!(body["models"][1], "b/two");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");

        let single = serde_json::to_value(OpenRouterRequest {
            model: &models[0],
            models: None,
            messages: &messages,
            stream: false,
            temperature: 0.0,
        })
        .unwrap();
        assert!(single.get("models").is_none());
    }
}
