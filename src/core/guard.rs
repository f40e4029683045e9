use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Why an input was refused before the pipeline ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputRejection {
    #[error("Input is required. Paste a failed request, error JSON, or curl command.")]
    Empty,
    #[error("Input is too long ({length} characters, limit is {limit}).")]
    TooLong { length: usize, limit: usize },
    #[error("Input contains instructions aimed at the analysis model and was rejected.")]
    Injection { pattern: &'static str },
}

struct InjectionPattern {
    label: &'static str,
    regex: Regex,
}

fn pattern(label: &'static str, source: &str) -> InjectionPattern {
    InjectionPattern {
        label,
        regex: Regex::new(source).expect("valid injection pattern"),
    }
}

static INJECTION_PATTERNS: LazyLock<Vec<InjectionPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            "ignore-instructions",
            r"(?i)\b(ignore|disregard|forget|override)\s+(all\s+|any\s+)?(of\s+)?(the\s+|your\s+)?(previous|prior|above|earlier|preceding)\s+(instructions|prompts?|rules|directions)",
        ),
        pattern(
            "forget-instructions",
            r"(?i)\bforget\s+(all\s+)?(your|the)\s+(instructions|rules|guidelines)",
        ),
        pattern(
            "reveal-system-prompt",
            r"(?i)\b(reveal|show|print|repeat|output|display|leak)\s+(me\s+)?(your|the)\s+(full\s+|hidden\s+|original\s+)?(system\s+prompt|initial\s+instructions|hidden\s+instructions)",
        ),
        pattern(
            "what-is-system-prompt",
            r"(?i)\bwhat\s+(is|are)\s+your\s+(system\s+prompt|instructions)",
        ),
        pattern("persona-you-are-now", r"(?i)\byou\s+are\s+now\s+(a|an|the|my)\b"),
        pattern("persona-pretend", r"(?i)\bpretend\s+(to\s+be|you\s+are)\b"),
        pattern(
            "persona-from-now-on",
            r"(?i)\bfrom\s+now\s+on,?\s+(you\s+(are|will|must)|act|respond)\b",
        ),
        pattern(
            "persona-assume",
            r"(?i)\b(assume|adopt|take\s+on)\s+(a\s+|the\s+)?(new\s+)?(role|persona|identity)\b",
        ),
        pattern("persona-new", r"(?i)\bnew\s+persona\b"),
        pattern("persona-act-as", r"(?i)\bact\s+as\s+.+\binstead\b"),
        pattern(
            "jailbreak-dan",
            r"(?i)\b(enable|activate|enter|switch\s+(on|to))\s+(the\s+)?(DAN|developer)\s+mode\b",
        ),
    ]
});

/// Check raw request text. Order: presence, length, injection patterns.
pub fn validate_input(raw: &str, max_chars: usize) -> Result<(), InputRejection> {
    if raw.trim().is_empty() {
        return Err(InputRejection::Empty);
    }

    let length = raw.chars().count();
    if length > max_chars {
        return Err(InputRejection::TooLong {
            length,
            limit: max_chars,
        });
    }

    if let Some(hit) = INJECTION_PATTERNS.iter().find(|p| p.regex.is_match(raw)) {
        return Err(InputRejection::Injection { pattern: hit.label });
    }

    Ok(())
}
