use axum::Json;
use utoipa::OpenApi;

use crate::routes::{chat, index, status};

#[derive(OpenApi)]
#[openapi(info(
    title = "venice-server",
    description = "Streaming chat API for a quantized Venice Uncensored model"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(index::IndexApi::openapi());
    root.merge(status::StatusApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root
}

/// `GET /api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
