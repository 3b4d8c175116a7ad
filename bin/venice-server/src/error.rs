//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the form
//! `{"error": "..."}` with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned to the caller, so file paths and engine internals never leak.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use venice_core::ChatError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The model has not finished loading.
    #[error("Model not loaded")]
    ModelNotReady,

    /// Admission is closed because the server is stopping.
    #[error("server is shutting down")]
    ShuttingDown,

    /// The request body exceeded the accepted size.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::ModelNotReady => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ServerError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ServerError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<ChatError> for ServerError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::ModelNotReady => ServerError::ModelNotReady,
            ChatError::Closed => ServerError::ShuttingDown,
            other => {
                error!(error = ?other, "chat turn could not start");
                ServerError::Internal(other.to_string())
            }
        }
    }
}
