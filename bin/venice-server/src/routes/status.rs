//! Readiness and heartbeat endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::schemas::chat::StatusResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_status, get_health), components(schemas(StatusResponse)))]
pub struct StatusApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/health", get(get_health))
}

/// Whether the model has finished loading.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "chat",
    responses((status = 200, description = "Model readiness", body = StatusResponse))
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        loaded: state.chat.is_ready(),
    })
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "ok", "version": "..."}` with HTTP 200 whether or not
/// the model is loaded.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Server is healthy", body = Value))
)]
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::testing;

    #[tokio::test]
    async fn status_reports_loaded_model() {
        let Json(body) = get_status(State(testing::ready_state(&["x"]))).await;
        assert!(body.loaded);
    }

    #[tokio::test]
    async fn status_reports_unloaded_model() {
        let Json(body) = get_status(State(testing::unloaded_state())).await;
        assert!(!body.loaded);
    }

    #[tokio::test]
    async fn health_response_has_ok_status_and_version() {
        let Json(body) = get_health().await;
        assert_eq!(body["status"], "ok");
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }
}
