use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::incident::{IncidentClassification, IncidentInput, IncidentReport};
use super::llm::{
    ChatMessage, CompletionRequest, LlmProvider, parse_json_object, str_field, str_list_field,
};

pub const REPRODUCTION_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const REPRODUCTION_DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const SUMMARY_CHARS: usize = 150;

const SYSTEM_PROMPT: &str = "You are a senior support engineer at OpenRouter, a unified LLM API gateway that routes requests to many AI providers (OpenAI, Anthropic, Google, and others).

Analyze the incident and produce a clear, actionable report for the customer and for internal escalation.

ROOT CAUSE
One clear sentence stating the most likely cause. Be specific, not speculative.

EVIDENCE
3 to 5 specific observations from the incident data that support the root cause.

CUSTOMER IMPACT
The impact on the customer in plain language: is production traffic blocked, what functionality is affected, how many users might notice.

IMMEDIATE MITIGATION
2 to 4 steps the customer can take right now. Name concrete alternative models when suggesting a fallback, exact values when suggesting parameter changes, and a backoff strategy when suggesting retries.

REPRODUCTION SCRIPT
A minimal curl command that reproduces the error. Use the placeholder key YOUR_API_KEY.

ESCALATION NOTES
Whether the provider needs to be notified, patterns to watch, and recommended monitoring.

TONE: calm, professional, solution-focused. No blame language.

Respond with one JSON object only, no markdown:
{
  \"rootCause\": \"...\",
  \"evidence\": [\"...\", \"...\"],
  \"customerImpact\": \"...\",
  \"mitigation\": [\"...\", \"...\"],
  \"reproductionScript\": \"curl ...\",
  \"escalationNotes\": \"...\"
}";

/// Final pipeline stage. Asks the report models for a write-up and falls
/// back to [`fallback_report`] when they cannot deliver one.
pub struct Explainer {
    llm: Arc<dyn LlmProvider>,
    models: Vec<String>,
}

impl Explainer {
    pub fn new(llm: Arc<dyn LlmProvider>, models: Vec<String>) -> Self {
        Self { llm, models }
    }

    pub async fn explain(
        &self,
        input: &IncidentInput,
        classification: &IncidentClassification,
    ) -> IncidentReport {
        match self.explain_with_model(input, classification).await {
            Ok(report) => {
                info!("Incident report written by {:?}", self.models);
                report
            }
            Err(e) => {
                warn!("Explainer model call failed, using report template: {:#}", e);
                fallback_report(input, classification)
            }
        }
    }

    async fn explain_with_model(
        &self,
        input: &IncidentInput,
        classification: &IncidentClassification,
    ) -> Result<IncidentReport> {
        let request = build_request(&self.models, input, classification)?;
        let content = self.llm.generate(&request).await?;
        let parsed = parse_report(&content)?;
        Ok(backfill(parsed, fallback_report(input, classification)))
    }
}

fn build_request(
    models: &[String],
    input: &IncidentInput,
    classification: &IncidentClassification,
) -> Result<CompletionRequest> {
    let user_message = format!(
        "INCIDENT DATA:\n{}\n\nCLASSIFICATION (from initial triage):\n{}",
        input.prompt_payload(),
        serde_json::to_string_pretty(classification)?
    );
    Ok(CompletionRequest {
        models: models.to_vec(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_message),
        ],
        temperature: 0.2,
    })
}

/// Map a model answer onto a report. Missing text fields become empty.
pub fn parse_report(content: &str) -> Result<IncidentReport> {
    let map = parse_json_object(content)?;
    Ok(IncidentReport {
        root_cause: str_field(&map, "rootCause")
            .unwrap_or_else(|| "Unable to determine root cause".to_string()),
        evidence: str_list_field(&map, "evidence"),
        customer_impact: str_field(&map, "customerImpact")
            .unwrap_or_else(|| "Impact unknown".to_string()),
        mitigation: str_list_field(&map, "mitigation"),
        reproduction_script: str_field(&map, "reproductionScript").unwrap_or_default(),
        escalation_notes: str_field(&map, "escalationNotes").unwrap_or_default(),
        similar_incidents: None,
    })
}

// Sections the model left empty are taken from the template report.
fn backfill(mut report: IncidentReport, template: IncidentReport) -> IncidentReport {
    if report.evidence.is_empty() {
        report.evidence = template.evidence;
    }
    if report.mitigation.is_empty() {
        report.mitigation = template.mitigation;
    }
    if report.reproduction_script.is_empty() {
        report.reproduction_script = template.reproduction_script;
    }
    if report.escalation_notes.is_empty() {
        report.escalation_notes = template.escalation_notes;
    }
    report
}

/// Deterministic report built from the incident and its classification.
pub fn fallback_report(
    input: &IncidentInput,
    classification: &IncidentClassification,
) -> IncidentReport {
    let model = input.model.as_deref().unwrap_or("unknown model");
    let code = input.error.code;
    let summary: String = input.error.message.chars().take(SUMMARY_CHARS).collect();

    let root_cause = if code > 0 {
        format!("HTTP {} error from {}: {}", code, model, summary)
    } else {
        format!("Incident reported for {}: {}", model, summary)
    };

    let mut evidence = Vec::with_capacity(classification.signals.len() + 2);
    if code > 0 {
        evidence.push(format!("HTTP status code: {}", code));
    }
    evidence.push(format!("Error summary: {}", summary));
    evidence.extend(classification.signals.iter().cloned());

    let customer_impact = if classification.severity.is_production_impacting() {
        "Production traffic is likely affected."
    } else {
        "Limited impact expected."
    };

    IncidentReport {
        root_cause,
        evidence,
        customer_impact: customer_impact.to_string(),
        mitigation: vec![
            "Retry the request with exponential backoff".to_string(),
            "Consider switching to a fallback model".to_string(),
        ],
        reproduction_script: reproduction_curl(input.model.as_deref()),
        escalation_notes: format!(
            "Fault domain: {}. Monitor for recurrence.",
            classification.fault_domain.as_str()
        ),
        similar_incidents: None,
    }
}

#[derive(Serialize)]
struct ReproductionBody<'a> {
    model: &'a str,
    messages: [ChatMessage; 1],
}

/// Minimal chat request against the public endpoint with a placeholder key.
pub fn reproduction_curl(model: Option<&str>) -> String {
    let body = ReproductionBody {
        model: model.unwrap_or(REPRODUCTION_DEFAULT_MODEL),
        messages: [ChatMessage::user("Hello")],
    };
    // Field order is kept: model first.
    let json = serde_json::to_string(&body).unwrap_or_default();
    // The body sits inside single quotes on the command line.
    let quoted = json.replace('\'', r"'\''");

    format!(
        "curl -X POST {} \\\n  -H \"Authorization: Bearer YOUR_API_KEY\" \\\n  -H \"Content-Type: application/json\" \\\n  -d '{}'",
        REPRODUCTION_ENDPOINT, quoted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::fallback_classification;
    use crate::core::incident::{FaultDomain, Severity};
    use crate::core::llm::fake::ScriptedProvider;
    use crate::core::normalizer::normalize;

    fn explainer(provider: Arc<ScriptedProvider>) -> Explainer {
        Explainer::new(
            provider,
            vec![
                "anthropic/claude-3.5-sonnet".to_string(),
                "openai/gpt-4o".to_string(),
            ],
        )
    }

    fn assert_complete(report: &IncidentReport) {
        assert!(!report.root_cause.trim().is_empty());
        assert!(!report.evidence.is_empty());
        assert!(!report.customer_impact.trim().is_empty());
        assert!(!report.mitigation.is_empty());
        assert!(report.reproduction_script.starts_with("curl "));
        assert!(report.reproduction_script.contains("YOUR_API_KEY"));
        assert!(!report.escalation_notes.trim().is_empty());
    }

    #[test]
    fn fallback_report_from_fallback_classification_is_complete() {
        for raw in [
            r#"{"model":"openai/gpt-4o","error":{"code":429,"message":"Rate limit exceeded"}}"#,
            "curl https://x -d '{\"model\": \"meta/llama-3\"}'",
            "everything is on fire",
            "",
        ] {
            let input = normalize(raw);
            let classification = fallback_classification(&input);
            let report = fallback_report(&input, &classification);
            assert_complete(&report);
            assert!(report.similar_incidents.is_none());
        }
    }

    #[test]
    fn fallback_report_wording() {
        let input = normalize(r#"{"model":"openai/gpt-4o","error":{"code":503,"message":"No capacity"}}"#);
        let classification = fallback_classification(&input);
        let report = fallback_report(&input, &classification);

        assert_eq!(report.root_cause, "HTTP 503 error from openai/gpt-4o: No capacity");
        assert_eq!(
            report.evidence,
            vec![
                "HTTP status code: 503",
                "Error summary: No capacity",
                "HTTP 503",
                "No capacity",
            ]
        );
        assert_eq!(report.customer_impact, "Limited impact expected.");
        assert_eq!(
            report.escalation_notes,
            "Fault domain: upstream-provider. Monitor for recurrence."
        );
        assert!(report.reproduction_script.contains(r#""model":"openai/gpt-4o""#));
    }

    #[test]
    fn fallback_report_without_status_or_model() {
        let input = normalize("requests hang forever");
        let mut classification = fallback_classification(&input);
        classification.severity = Severity::Critical;
        classification.fault_domain = FaultDomain::OpenrouterPlatform;
        let report = fallback_report(&input, &classification);

        assert_eq!(
            report.root_cause,
            "Incident reported for unknown model: requests hang forever"
        );
        assert_eq!(report.evidence[0], "Error summary: requests hang forever");
        assert_eq!(report.customer_impact, "Production traffic is likely affected.");
        assert!(report.reproduction_script.contains(REPRODUCTION_DEFAULT_MODEL));
    }

    #[test]
    fn summary_is_cut_at_150_chars() {
        let long = "é".repeat(400);
        let input = normalize(&long);
        let report = fallback_report(&input, &fallback_classification(&input));
        let expected = format!("Incident reported for unknown model: {}", "é".repeat(150));
        assert_eq!(report.root_cause, expected);
    }

    #[test]
    fn reproduction_curl_escapes_single_quotes() {
        let script = reproduction_curl(Some("openai/o'brien"));
        assert!(script.contains(r"o'\''brien"));
        assert!(script.starts_with(&format!("curl -X POST {}", REPRODUCTION_ENDPOINT)));
    }

    #[test]
    fn reproduction_curl_body_names_model_first() {
        let script = reproduction_curl(Some("openai/gpt-4o"));
        assert!(script.ends_with(
            r#"-d '{"model":"openai/gpt-4o","messages":[{"role":"user","content":"Hello"}]}'"#
        ));
    }

    #[tokio::test]
    async fn model_report_is_used_and_gaps_backfilled() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(r#"```json
{
  "rootCause": "Anthropic capacity shortfall during peak traffic.",
  "evidence": ["HTTP 529", "overloaded_error type", "3 retries failed"],
  "customerImpact": "Chat completions fail intermittently.",
  "mitigation": ["Route to openai/gpt-4o as fallback"]
}
```"#)]));
        let input = normalize("529 overloaded from anthropic/claude-3.5-sonnet");
        let classification = fallback_classification(&input);
        let report = explainer(provider.clone()).explain(&input, &classification).await;

        assert_eq!(report.root_cause, "Anthropic capacity shortfall during peak traffic.");
        assert_eq!(report.evidence.len(), 3);
        assert_eq!(report.mitigation, vec!["Route to openai/gpt-4o as fallback"]);
        assert!(report.reproduction_script.contains("anthropic/claude-3.5-sonnet"));
        assert_eq!(
            report.escalation_notes,
            "Fault domain: upstream-provider. Monitor for recurrence."
        );
        assert_complete(&report);

        let request = &provider.requests()[0];
        assert_eq!(request.models.len(), 2);
        assert_eq!(request.temperature, 0.2);
        assert!(request.messages[1].content.contains("CLASSIFICATION (from initial triage):"));
        assert!(request.messages[1].content.contains("\"faultDomain\": \"upstream-provider\""));
    }

    #[tokio::test]
    async fn empty_object_gets_field_defaults() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("{}")]));
        let input = normalize("401 invalid key");
        let report = explainer(provider)
            .explain(&input, &fallback_classification(&input))
            .await;
        assert_eq!(report.root_cause, "Unable to determine root cause");
        assert_eq!(report.customer_impact, "Impact unknown");
        assert_complete(&report);
    }

    #[tokio::test]
    async fn collaborator_failures_fall_back() {
        let input = normalize(r#"{"model":"openai/gpt-4o","error":{"code":500,"message":"Internal"}}"#);
        let classification = fallback_classification(&input);
        let expected = fallback_report(&input, &classification);

        let scripts: Vec<Vec<Result<&str, &str>>> = vec![
            vec![Err("deadline has elapsed")],
            vec![Ok("   ")],
            vec![Ok("{\"rootCause\": ")],
            vec![Ok("\"just a string\"")],
            vec![],
        ];
        for script in scripts {
            let provider = Arc::new(ScriptedProvider::new(script));
            let report = explainer(provider).explain(&input, &classification).await;
            assert_eq!(report, expected);
            assert_complete(&report);
        }
    }
}
