//! Demo application served behind the tap.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Look up a user by numeric id.
pub async fn get_user(Path(id): Path<String>) -> Response {
    match id.parse::<u64>() {
        Ok(id) => Json(json!({ "id": id })).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "User not found").into_response(),
    }
}

/// Anything unrouted.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CACHE_CONTROL, "no-store")],
        "No matching route",
    )
        .into_response()
}
