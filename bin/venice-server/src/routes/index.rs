//! The embedded chat page.

use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::get;
use utoipa::OpenApi;

use crate::state::AppState;

static INDEX_HTML: &str = include_str!("../../assets/index.html");

#[derive(OpenApi)]
#[openapi(paths(index))]
pub struct IndexApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// Serve the single-page chat UI.
#[utoipa::path(
    get,
    path = "/",
    tag = "ui",
    responses((status = 200, description = "Chat page", body = String, content_type = "text/html"))
)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
