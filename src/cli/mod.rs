mod analyze;
mod serve;

use anyhow::Result;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::classifier::Classifier;
use crate::core::config::{self, AppConfig};
use crate::core::explainer::Explainer;
use crate::core::history::{IncidentHistory, SqliteHistory};
use crate::core::llm::{LlmProvider, OpenRouterProvider};
use crate::core::pipeline::{AnalyzerConfig, IncidentAnalyzer};
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Commands")
        .command("serve", "Start the HTTP analysis API")
        .command("analyze", "Analyze one incident and print the report")
        .command("history", "List recently analyzed incidents")
        .command("help", "Show this message")
        .print();

    GuideSection::new("Options")
        .text("serve    --api-host <host>  --api-port <port>")
        .text("analyze  --input <text> | --file <path>  [--json]   (reads stdin otherwise)")
        .text("history  --limit <n>")
        .blank()
        .text("Configuration: $TRIAGE_DATA_DIR/config.toml (default ~/.incident-triage)")
        .text("Model access:  OPENROUTER_API_KEY")
        .print();

    println!(
        " {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("incident-triage").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct AnalyzeArgs {
    pub input: Option<String>,
    pub file: Option<PathBuf>,
    pub json: bool,
}

pub(crate) fn parse_analyze_args(args: &[String], start: usize) -> AnalyzeArgs {
    let mut parsed = AnalyzeArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    parsed.input = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    parsed.file = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    parsed
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(api_port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

pub(crate) fn parse_limit_flag(args: &[String], start: usize, default: usize) -> usize {
    let mut limit = default;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-n" => {
                if i + 1 < args.len() {
                    limit = args[i + 1].parse().unwrap_or(default);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    limit.max(1)
}

/// Wire the pipeline from config. Returns the analyzer and whether a model
/// API key is present.
pub(crate) async fn build_analyzer(config: &AppConfig) -> Result<(IncidentAnalyzer, bool)> {
    let provider = OpenRouterProvider::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        Duration::from_secs(config.llm.request_timeout_secs),
    )?;
    let llm_configured = provider.is_configured();
    if !llm_configured {
        warn!("OPENROUTER_API_KEY is not set, every analysis will use the rule-based fallbacks");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(provider);
    info!(
        "Model provider {} at {}, classifier={}",
        llm.provider_id(),
        config.llm.base_url,
        config.llm.classifier_model
    );

    let history: Option<Arc<dyn IncidentHistory>> = if config.history.enabled {
        let db_path = config.history_db_path();
        match SqliteHistory::open(&db_path).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(
                    "Incident history disabled, could not open {}: {:#}",
                    db_path.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let analyzer = IncidentAnalyzer::new(
        Classifier::new(llm.clone(), config.llm.classifier_model.clone()),
        Explainer::new(llm, config.llm.explainer_models.clone()),
        history,
        AnalyzerConfig {
            max_input_chars: config.limits.max_input_chars,
            similar_limit: config.history.similar_limit,
        },
    );
    Ok((analyzer, llm_configured))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let cmd = args[1].as_str();
    if matches!(cmd, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load(config::data_dir()).await?;

    match cmd {
        "serve" => {
            let (api_host, api_port) = parse_api_server_flags(
                &args,
                2,
                config.server.host.clone(),
                config.server.port,
            );
            serve::run_server(config, api_host, api_port).await
        }
        "analyze" => analyze::run_analyze(config, parse_analyze_args(&args, 2)).await,
        "history" => analyze::run_history(config, parse_limit_flag(&args, 2, 20)).await,
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
