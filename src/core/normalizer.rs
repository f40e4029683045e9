use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::incident::{ErrorInfo, IncidentInput, InputType};

const UNKNOWN_ERROR: &str = "Unknown error";
const CURL_UNPARSED_ERROR: &str = "Could not parse error from curl command";

static CURL_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""model"\s*:\s*"([^"]+)""#).expect("valid curl model regex"));
static CURL_ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""error"\s*:\s*(\{[^}]+\})"#).expect("valid curl error regex"));
static PROSE_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(4\d{2}|5\d{2})\b").expect("valid status regex"));
static PROSE_MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(anthropic|openai|google|meta)/[\w.-]+").expect("valid model regex")
});

/// Turn free-form failure text into an [`IncidentInput`].
///
/// Never fails. Text starting with `{` or `[` is read as JSON, text starting
/// with `curl` as a shell command, anything else as prose. JSON that does not
/// parse degrades to the prose reading.
pub fn normalize(raw: &str) -> IncidentInput {
    let trimmed = raw.trim();

    if looks_like_structured(trimmed) {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => return parse_structured(raw, &value),
            Err(e) => {
                warn!("Structured input did not parse ({}), reading it as prose", e);
            }
        }
    } else if looks_like_shell_command(trimmed) {
        return parse_shell_command(raw, trimmed);
    }

    parse_prose(raw, trimmed)
}

fn looks_like_structured(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

fn looks_like_shell_command(text: &str) -> bool {
    text.to_lowercase().starts_with("curl")
}

fn parse_structured(raw: &str, value: &Value) -> IncidentInput {
    let error = match value.get("error") {
        Some(Value::Object(_)) => {
            let err = &value["error"];
            ErrorInfo {
                code: coerce_code(err.get("code")),
                message: coerce_message(err.get("message"), UNKNOWN_ERROR),
            }
        }
        Some(Value::String(message)) if !message.trim().is_empty() => ErrorInfo {
            code: 0,
            message: message.clone(),
        },
        _ => ErrorInfo {
            code: 0,
            message: UNKNOWN_ERROR.to_string(),
        },
    };

    let latency_ms = first_present(value, &["latency_ms", "latencyMs"]).and_then(coerce_number);
    let request_id = first_present(value, &["request_id", "requestId"]).and_then(coerce_text);

    debug!("Normalized structured incident (code={})", error.code);
    IncidentInput {
        model: value.get("model").and_then(coerce_text),
        error,
        latency_ms,
        request_id,
        raw_input: raw.to_string(),
        input_type: InputType::Structured,
    }
}

fn parse_shell_command(raw: &str, trimmed: &str) -> IncidentInput {
    let model = CURL_MODEL_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let mut error = ErrorInfo {
        code: 0,
        message: CURL_UNPARSED_ERROR.to_string(),
    };

    if let Some(fragment) = CURL_ERROR_RE.captures(trimmed).and_then(|c| c.get(1)) {
        match serde_json::from_str::<Value>(fragment.as_str()) {
            Ok(obj) => {
                error.code = coerce_code(obj.get("code"));
                error.message = coerce_message(obj.get("message"), CURL_UNPARSED_ERROR);
            }
            Err(e) => debug!("Inline curl error object did not parse: {}", e),
        }
    }

    IncidentInput {
        model,
        error,
        latency_ms: None,
        request_id: None,
        raw_input: raw.to_string(),
        input_type: InputType::ShellCommand,
    }
}

fn parse_prose(raw: &str, trimmed: &str) -> IncidentInput {
    let code = PROSE_STATUS_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0);
    let model = PROSE_MODEL_RE
        .find(trimmed)
        .map(|m| m.as_str().to_string());

    let message = if trimmed.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        trimmed.to_string()
    };

    IncidentInput {
        model,
        error: ErrorInfo { code, message },
        latency_ms: None,
        request_id: None,
        raw_input: raw.to_string(),
        input_type: InputType::Prose,
    }
}

fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

/// Numbers and numeric strings; anything else is 0.
fn coerce_code(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

fn coerce_message(value: Option<&Value>, default: &str) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };
    if text.trim().is_empty() {
        default.to_string()
    } else {
        text
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
