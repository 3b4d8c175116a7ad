//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - the chat page and `/api` routes
//! - `/health`
//! - the OpenAPI document (disable with `VENICE_ENABLE_DOCS=false`)
//! - CORS and per-request trace-ID middleware

pub mod chat;
pub mod doc;
mod index;
mod status;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(index::router())
        .merge(status::router())
        .merge(chat::router());

    if state.config.enable_docs {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
