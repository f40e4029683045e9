pub mod analyze;
pub mod incidents;

use axum::{Json, http::StatusCode};

pub(crate) fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message })))
}
