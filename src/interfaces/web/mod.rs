mod handlers;
mod router;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::core::pipeline::IncidentAnalyzer;

pub use router::build_api_router;

#[derive(Clone)]
pub struct AppState {
    pub(crate) analyzer: Arc<IncidentAnalyzer>,
    pub(crate) llm_configured: bool,
    pub(crate) api_port: u16,
}

impl AppState {
    pub fn new(analyzer: IncidentAnalyzer, llm_configured: bool, api_port: u16) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            llm_configured,
            api_port,
        }
    }
}

/// Serve the API until Ctrl+C.
pub async fn serve(state: AppState, api_host: &str) -> Result<()> {
    let addr = format!("{}:{}", api_host, state.api_port);
    let app = build_api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!("API Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("API Server shutting down...");
        })
        .await?;
    Ok(())
}
