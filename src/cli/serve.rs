use anyhow::Result;
use tracing::info;

use super::build_analyzer;
use crate::core::config::AppConfig;
use crate::core::terminal::{self, ROCKET};
use crate::interfaces::web::{self, AppState};

pub async fn run_server(config: AppConfig, api_host: String, api_port: u16) -> Result<()> {
    let log_file = config.log_to_file.then(|| config.log_file_path());
    crate::logging::init(config.tracing_level(), log_file.as_deref())?;

    info!("Starting incident-triage {}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let (analyzer, llm_configured) = build_analyzer(&config).await?;
    let history_enabled = analyzer.history().is_some();
    let state = AppState::new(analyzer, llm_configured, api_port);

    terminal::print_banner();
    println!("{} {}", ROCKET, console::style("API server starting").bold());
    terminal::print_link("Endpoint", &format!("http://{}:{}/api/analyze", api_host, api_port));
    terminal::print_status(
        "Models",
        if llm_configured { "OpenRouter" } else { "offline (rule-based fallbacks)" },
    );
    terminal::print_status(
        "History",
        if history_enabled { "enabled" } else { "disabled" },
    );
    terminal::print_info("Press Ctrl+C to stop the server.");

    web::serve(state, &api_host).await
}
