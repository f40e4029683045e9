use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::super::AppState;
use super::error_response;
use crate::core::history::IncidentHistory;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(serde::Deserialize)]
pub struct ListQuery {
    limit: Option<usize>,
}

#[derive(serde::Deserialize)]
pub struct SimilarQuery {
    message: Option<String>,
    limit: Option<usize>,
}

fn history_store(state: &AppState) -> Result<&Arc<dyn IncidentHistory>, Response> {
    state.analyzer.history().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Incident history is disabled.",
        )
        .into_response()
    })
}

fn store_failure(e: anyhow::Error) -> Response {
    error!("Incident history query failed: {:#}", e);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Incident history is unavailable.",
    )
    .into_response()
}

pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let history = match history_store(&state) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    match history.recent(limit).await {
        Ok(incidents) => Json(serde_json::json!({ "incidents": incidents })).into_response(),
        Err(e) => store_failure(e),
    }
}

pub async fn similar_incidents(
    State(state): State<AppState>,
    Query(query): Query<SimilarQuery>,
) -> Response {
    let history = match history_store(&state) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let Some(message) = query.message.filter(|m| !m.trim().is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Query parameter \"message\" is required.",
        )
        .into_response();
    };
    let limit = query.limit.unwrap_or(3).clamp(1, MAX_LIST_LIMIT);

    match history.find_similar(&message, limit).await {
        Ok(incidents) => Json(serde_json::json!({ "incidents": incidents })).into_response(),
        Err(e) => store_failure(e),
    }
}

pub async fn get_incident(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let history = match history_store(&state) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match history.load_report(&id).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Incident not found.").into_response(),
        Err(e) => store_failure(e),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "history": state.analyzer.history().is_some(),
        "llm": state.llm_configured,
    }))
}
