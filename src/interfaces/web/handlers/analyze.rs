use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use super::super::AppState;
use super::error_response;

/// `POST /api/analyze` with `{"input": "..."}`.
///
/// The body is parsed by hand so that every malformed request gets the same
/// `400 {"error": ...}` shape instead of the extractor's plain-text rejection.
/// Bodies over the router's limit get `413` in the same shape.
pub async fn analyze_endpoint(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            warn!("Rejected analyze request body: {}", rejection.body_text());
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Request body is too large."
            } else {
                "Request body could not be read."
            };
            return error_response(status, message).into_response();
        }
    };

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Rejected analyze request with unreadable body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Request body must be JSON.")
                .into_response();
        }
    };

    let Some(input) = payload.get("input").and_then(|v| v.as_str()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Field \"input\" is required and must be a string.",
        )
        .into_response();
    };

    match state.analyzer.analyze(input).await {
        Ok(analysis) => {
            info!(
                "Analysis complete: {} / {}",
                analysis.classification.fault_domain.as_str(),
                analysis.classification.severity.as_str()
            );
            Json(analysis).into_response()
        }
        Err(rejection) => {
            error_response(StatusCode::BAD_REQUEST, &rejection.to_string()).into_response()
        }
    }
}
