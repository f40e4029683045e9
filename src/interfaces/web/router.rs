use axum::{
    Json, Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{analyze, incidents};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

// Worst case for one input character once JSON-escaped (a `\uXXXX` surrogate pair).
const ESCAPED_BYTES_PER_CHAR: usize = 12;
const BODY_ENVELOPE_BYTES: usize = 4096;

/// Largest request body that can still carry an input within the character limit.
fn body_limit(max_input_chars: usize) -> usize {
    max_input_chars
        .saturating_mul(ESCAPED_BYTES_PER_CHAR)
        .saturating_add(BODY_ENVELOPE_BYTES)
}

pub fn build_api_router(state: AppState) -> Router {
    let limit = body_limit(state.analyzer.max_input_chars());
    Router::new()
        .route("/api/health", get(incidents::health))
        .route("/api/analyze", post(analyze::analyze_endpoint))
        .route("/api/incidents", get(incidents::list_incidents))
        .route("/api/incidents/similar", get(incidents::similar_incidents))
        .route("/api/incidents/{id}", get(incidents::get_incident))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    tracing::error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Internal server error" })),
    )
        .into_response()
}

async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}
