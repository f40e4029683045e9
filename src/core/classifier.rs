use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use super::incident::{ErrorCategory, FaultDomain, IncidentClassification, IncidentInput, Severity};
use super::llm::{
    ChatMessage, CompletionRequest, LlmProvider, parse_json_object, str_field, str_list_field,
};

/// Upper bound on evidence strings kept from a model answer.
const MAX_MODEL_SIGNALS: usize = 4;

const SYSTEM_PROMPT: &str = "You are an API incident classifier for OpenRouter, a unified LLM API gateway.

Analyze the incident data and classify it.

1. ERROR CATEGORY - one of:
   - \"4xx\": client error (bad request, auth, not found, rate limited)
   - \"5xx\": server error (internal error, bad gateway, service unavailable)
   - \"timeout\": request exceeded a time limit
   - \"stream_abort\": streaming response interrupted
   - \"unknown\": cannot determine

2. FAULT DOMAIN - who is most likely responsible:
   - \"customer\": the customer's request (bad params, auth, exceeding their own limits)
   - \"openrouter-platform\": OpenRouter's own infrastructure
   - \"upstream-provider\": the model provider (Anthropic, OpenAI, Google, ...)

3. SEVERITY - business impact:
   - \"low\": minor issue, easy workaround
   - \"medium\": noticeable impact, workaround exists
   - \"high\": significant impact, limited workarounds
   - \"critical\": service down, no workaround

4. PROVIDER - provider name if identifiable (e.g. \"anthropic\", \"openai\"), else null

5. SIGNALS - 2 to 4 short evidence points supporting the classification

RULES:
- 503 with high latency or an upstream message -> upstream-provider
- 400/401/403 -> usually customer
- 429 -> customer when over their own limit, upstream-provider when the provider lacks capacity
- 500 -> openrouter-platform or upstream-provider
- timeout above 30s -> likely upstream-provider
- \"rate limit\" in the message -> decide whether it is the user's limit or the provider's

Respond with one JSON object only, no markdown:
{
  \"errorCategory\": \"...\",
  \"faultDomain\": \"...\",
  \"severity\": \"...\",
  \"provider\": \"...\" or null,
  \"signals\": [\"...\", \"...\"]
}";

/// First pipeline stage after normalization. Asks a fast model for a
/// classification and falls back to [`fallback_classification`] on any failure.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { llm, model }
    }

    pub async fn classify(&self, input: &IncidentInput) -> IncidentClassification {
        match self.classify_with_model(input).await {
            Ok(classification) => {
                info!(
                    "Classified incident via {}: {} / {} / {}",
                    self.model,
                    classification.error_category.as_str(),
                    classification.fault_domain.as_str(),
                    classification.severity.as_str()
                );
                classification
            }
            Err(e) => {
                warn!("Classifier model call failed, using rule table: {:#}", e);
                fallback_classification(input)
            }
        }
    }

    async fn classify_with_model(&self, input: &IncidentInput) -> Result<IncidentClassification> {
        let request = build_request(&self.model, input);
        let content = self.llm.generate(&request).await?;
        parse_classification(&content)
    }
}

fn build_request(model: &str, input: &IncidentInput) -> CompletionRequest {
    CompletionRequest {
        models: vec![model.to_string()],
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("INCIDENT DATA:\n{}", input.prompt_payload())),
        ],
        temperature: 0.0,
    }
}

/// Map a model answer onto a classification, defaulting every missing field.
pub fn parse_classification(content: &str) -> Result<IncidentClassification> {
    let map = parse_json_object(content)?;

    let mut signals = str_list_field(&map, "signals");
    signals.truncate(MAX_MODEL_SIGNALS);

    Ok(IncidentClassification {
        error_category: str_field(&map, "errorCategory")
            .map(|s| ErrorCategory::from_label(&s))
            .unwrap_or(ErrorCategory::Unknown),
        fault_domain: str_field(&map, "faultDomain")
            .map(|s| FaultDomain::from_label(&s))
            .unwrap_or(FaultDomain::Unknown),
        severity: str_field(&map, "severity")
            .map(|s| Severity::from_label(&s))
            .unwrap_or(Severity::Medium),
        provider: str_field(&map, "provider").filter(|p| p != "null"),
        signals,
    })
}

/// Deterministic classification from the HTTP status alone.
pub fn fallback_classification(input: &IncidentInput) -> IncidentClassification {
    let code = input.error.code;
    let (error_category, fault_domain) = match code {
        400..=499 => (ErrorCategory::ClientError, FaultDomain::Customer),
        500..=599 => (ErrorCategory::ServerError, FaultDomain::UpstreamProvider),
        _ => (ErrorCategory::Unknown, FaultDomain::OpenrouterPlatform),
    };

    IncidentClassification {
        error_category,
        fault_domain,
        severity: Severity::Medium,
        provider: input.provider(),
        signals: vec![format!("HTTP {}", code), input.error.message.clone()],
    }
}
