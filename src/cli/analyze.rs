use anyhow::{Context, Result, bail};
use tokio::io::AsyncReadExt;
use tracing::Level;

use super::{AnalyzeArgs, build_analyzer};
use crate::core::config::AppConfig;
use crate::core::history::{IncidentHistory, SqliteHistory};
use crate::core::terminal::{self, print_step, print_warn};

// One-shot commands keep stdout for the report, so chatter stays at warn.
fn init_quiet_logging(config: &AppConfig) -> Result<()> {
    let level = config.tracing_level().min(Level::WARN);
    let log_file = config.log_to_file.then(|| config.log_file_path());
    crate::logging::init(level, log_file.as_deref())
}

async fn read_input(args: &AnalyzeArgs) -> Result<String> {
    if let Some(input) = &args.input {
        return Ok(input.clone());
    }
    if let Some(path) = &args.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read incident from stdin")?;
    Ok(raw)
}

pub async fn run_analyze(config: AppConfig, args: AnalyzeArgs) -> Result<()> {
    init_quiet_logging(&config)?;

    let raw = read_input(&args).await?;
    let (analyzer, llm_configured) = build_analyzer(&config).await?;
    if !llm_configured && !args.json {
        print_warn("OPENROUTER_API_KEY is not set, using rule-based analysis.");
    }

    let analysis = analyzer.analyze(&raw).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        terminal::print_analysis(&analysis);
    }
    Ok(())
}

pub async fn run_history(config: AppConfig, limit: usize) -> Result<()> {
    init_quiet_logging(&config)?;

    if !config.history.enabled {
        bail!("Incident history is disabled in config.toml ([history] enabled = false).");
    }
    let store = SqliteHistory::open(config.history_db_path()).await?;
    let incidents = store.recent(limit).await?;

    print_step(&format!("Last {} incident(s)", incidents.len()));
    terminal::print_incident_table(&incidents);
    Ok(())
}
