use serde::{Deserialize, Serialize};

/// Which parser produced an [`IncidentInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Structured,
    ShellCommand,
    Prose,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Structured => "structured",
            InputType::ShellCommand => "shell-command",
            InputType::Prose => "prose",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// HTTP status, or 0 when none could be recovered.
    pub code: i64,
    pub message: String,
}

/// Canonical record of one reported failure, independent of the input shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub error: ErrorInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub raw_input: String,
    pub input_type: InputType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IncidentDigest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    error: &'a ErrorInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

impl IncidentInput {
    /// Incident text handed to the models: prose verbatim, anything else as a
    /// pretty-printed digest of the extracted fields.
    pub fn prompt_payload(&self) -> String {
        if self.input_type == InputType::Prose {
            return self.raw_input.trim().to_string();
        }
        let digest = IncidentDigest {
            model: self.model.as_deref(),
            error: &self.error,
            latency_ms: self.latency_ms,
            request_id: self.request_id.as_deref(),
        };
        serde_json::to_string_pretty(&digest).unwrap_or_else(|_| self.raw_input.clone())
    }

    /// Provider half of a `<provider>/<model>` identifier. A model without a
    /// slash is returned whole.
    pub fn provider(&self) -> Option<String> {
        self.model
            .as_deref()
            .and_then(|m| m.split('/').next())
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    #[serde(rename = "4xx")]
    ClientError,
    #[serde(rename = "5xx")]
    ServerError,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "stream_abort")]
    StreamAbort,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ErrorCategory {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "4xx" => ErrorCategory::ClientError,
            "5xx" => ErrorCategory::ServerError,
            "timeout" => ErrorCategory::Timeout,
            "stream_abort" | "stream-abort" => ErrorCategory::StreamAbort,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "4xx",
            ErrorCategory::ServerError => "5xx",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::StreamAbort => "stream_abort",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// Party most likely responsible for an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultDomain {
    Customer,
    OpenrouterPlatform,
    UpstreamProvider,
    /// Only produced when a model answer names no recognisable domain.
    Unknown,
}

impl FaultDomain {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace('_', "-").as_str() {
            "customer" | "client" => FaultDomain::Customer,
            "openrouter" | "openrouter-platform" | "platform" => FaultDomain::OpenrouterPlatform,
            "upstream-provider" | "upstream" | "provider" => FaultDomain::UpstreamProvider,
            _ => FaultDomain::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultDomain::Customer => "customer",
            FaultDomain::OpenrouterPlatform => "openrouter-platform",
            FaultDomain::UpstreamProvider => "upstream-provider",
            FaultDomain::Unknown => "unknown",
        }
    }
}

/// Declaration order is the display order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Unrecognised labels read as `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn is_production_impacting(&self) -> bool {
        *self >= Severity::High
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentClassification {
    pub error_category: ErrorCategory,
    pub fault_domain: FaultDomain,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarIncident {
    pub id: String,
    pub created_at: String,
    pub error_message: String,
    pub fault_domain: String,
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub root_cause: String,
    pub evidence: Vec<String>,
    pub customer_impact: String,
    pub mitigation: Vec<String>,
    pub reproduction_script: String,
    pub escalation_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_incidents: Option<Vec<SimilarIncident>>,
}

/// Everything the pipeline produced for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub incident: IncidentInput,
    pub classification: IncidentClassification,
    pub report: IncidentReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_totally_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::Critical.is_production_impacting());
        assert!(!Severity::Medium.is_production_impacting());
    }

    #[test]
    fn labels_accept_model_spellings() {
        assert_eq!(FaultDomain::from_label("upstream_provider"), FaultDomain::UpstreamProvider);
        assert_eq!(FaultDomain::from_label("OpenRouter"), FaultDomain::OpenrouterPlatform);
        assert_eq!(FaultDomain::from_label("the moon"), FaultDomain::Unknown);
        assert_eq!(ErrorCategory::from_label("5XX"), ErrorCategory::ServerError);
        assert_eq!(ErrorCategory::from_label("stream-abort"), ErrorCategory::StreamAbort);
        assert_eq!(Severity::from_label("urgent"), Severity::Medium);
    }

    #[test]
    fn classification_serializes_with_wire_labels() {
        let classification = IncidentClassification {
            error_category: ErrorCategory::ClientError,
            fault_domain: FaultDomain::OpenrouterPlatform,
            severity: Severity::High,
            provider: None,
            signals: vec!["HTTP 429".to_string()],
        };
        let value = serde_json::to_value(&classification).unwrap();
        assert_eq!(value["errorCategory"], "4xx");
        assert_eq!(value["faultDomain"], "openrouter-platform");
        assert_eq!(value["severity"], "high");
        assert!(value.get("provider").is_none());
    }

    #[test]
    fn prompt_payload_omits_absent_fields() {
        let input = IncidentInput {
            model: None,
            error: ErrorInfo {
                code: 504,
                message: "Gateway timeout".to_string(),
            },
            latency_ms: Some(30500.0),
            request_id: None,
            raw_input: "{}".to_string(),
            input_type: InputType::Structured,
        };
        let payload: serde_json::Value = serde_json::from_str(&input.prompt_payload()).unwrap();
        assert_eq!(payload["error"]["code"], 504);
        assert_eq!(payload["latencyMs"], 30500.0);
        assert!(payload.get("model").is_none());
        assert!(payload.get("requestId").is_none());
    }

    #[test]
    fn provider_is_prefix_before_slash() {
        let input = IncidentInput {
            model: Some("anthropic/claude-3.5-sonnet".to_string()),
            error: ErrorInfo {
                code: 529,
                message: "overloaded".to_string(),
            },
            latency_ms: None,
            request_id: None,
            raw_input: String::new(),
            input_type: InputType::Prose,
        };
        assert_eq!(input.provider().as_deref(), Some("anthropic"));
    }
}
