use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Also append logs to `triage.log` in the data directory.
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Usually supplied through `OPENROUTER_API_KEY` instead.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,

    /// Ordered by preference.
    #[serde(default = "default_explainer_models")]
    pub explainer_models: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17900
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}
fn default_classifier_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_explainer_models() -> Vec<String> {
    vec![
        "anthropic/claude-3.5-sonnet".to_string(),
        "openai/gpt-4o".to_string(),
    ]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_db_file() -> String {
    "incidents.db".to_string()
}
fn default_similar_limit() -> usize {
    3
}
fn default_max_input_chars() -> usize {
    20_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            classifier_model: default_classifier_model(),
            explainer_models: default_explainer_models(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_file: default_db_file(),
            similar_limit: default_similar_limit(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_to_file: false,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            history: HistoryConfig::default(),
            limits: LimitsConfig::default(),
            data_dir: PathBuf::new(),
        }
    }
}

/// `TRIAGE_DATA_DIR`, else `~/.incident-triage`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRIAGE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".incident-triage")
}

impl AppConfig {
    /// Read `config.toml` from `data_dir` if present, then apply environment
    /// overrides.
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            AppConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.sanitize();
        Ok(config)
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(key) = lookup("OPENROUTER_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = key;
        }
        if let Some(url) = lookup("TRIAGE_LLM_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(host) = lookup("TRIAGE_API_HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("TRIAGE_API_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid TRIAGE_API_PORT value: {}", port),
            }
        }
        if let Some(level) = lookup("TRIAGE_LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
            self.log_level = level;
        }
    }

    // Keep limits usable even when the file sets them to zero.
    fn sanitize(&mut self) {
        if self.limits.max_input_chars == 0 {
            self.limits.max_input_chars = default_max_input_chars();
        }
        if self.history.similar_limit == 0 {
            self.history.similar_limit = default_similar_limit();
        }
        if self.llm.explainer_models.is_empty() {
            self.llm.explainer_models = default_explainer_models();
        }
        if self.llm.request_timeout_secs == 0 {
            self.llm.request_timeout_secs = default_timeout_secs();
        }
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.history.db_file)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.data_dir.join("triage.log")
    }

    pub fn tracing_level(&self) -> Level {
        self.log_level.trim().parse().unwrap_or(Level::INFO)
    }

    pub fn log_summary(&self) {
        info!(
            "Config: api={}:{}, classifier={}, explainer={:?}, history={}, max_input={}",
            self.server.host,
            self.server.port,
            self.llm.classifier_model,
            self.llm.explainer_models,
            if self.history.enabled { "on" } else { "off" },
            self.limits.max_input_chars
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_openrouter() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.classifier_model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.explainer_models.len(), 2);
        assert!(config.history.enabled);
        assert_eq!(config.history.similar_limit, 3);
        assert_eq!(config.tracing_level(), Level::INFO);
    }

    #[tokio::test]
    async fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.history_db_path(), dir.path().join("incidents.db"));
    }

    #[tokio::test]
    async fn load_reads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let toml_content = r#"
log_level = "debug"

[server]
port = 8088

[llm]
classifier_model = "meta/llama-3.1-8b-instruct"
explainer_models = ["openai/gpt-4o"]

[history]
enabled = false

[limits]
max_input_chars = 0
"#;
        std::fs::write(dir.path().join(CONFIG_FILE), toml_content).unwrap();

        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.tracing_level(), Level::DEBUG);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.classifier_model, "meta/llama-3.1-8b-instruct");
        assert_eq!(config.llm.explainer_models, vec!["openai/gpt-4o"]);
        assert!(!config.history.enabled);
        assert_eq!(config.limits.max_input_chars, 20_000);
    }

    #[tokio::test]
    async fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[server\nport = ").unwrap();
        assert!(AppConfig::load(dir.path()).await.is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("TRIAGE_API_PORT", "9000"),
            ("TRIAGE_LLM_BASE_URL", "http://127.0.0.1:1/v1/chat/completions"),
            ("TRIAGE_LOG_LEVEL", "warn"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key, "sk-or-test");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.base_url, "http://127.0.0.1:1/v1/chat/completions");
        assert_eq!(config.tracing_level(), Level::WARN);
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|k| (k == "TRIAGE_API_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 17900);
    }
}
