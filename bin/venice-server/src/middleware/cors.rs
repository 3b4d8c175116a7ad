use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Restrict origins to `VENICE_CORS_ORIGINS` when set; otherwise allow any.
pub fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        // Wildcard, suitable for development; set VENICE_CORS_ORIGINS in production.
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
