use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use axum::response::IntoResponse;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies at or above this size are summarized instead of logged.
const LOG_BODY_LIMIT: usize = 1024;

/// Request bodies larger than this are refused with 413 before buffering.
pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Paths whose request bodies carry user text; only their size is logged.
const PRIVATE_BODY_PATHS: &[&str] = &["/api/chat"];

/// Assign or propagate `x-trace-id`, open an `http_request` span around the
/// handler and log status and latency.
///
/// Streaming (`text/event-stream`) responses pass through untouched; only
/// the time to first byte is logged for them.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let (parts, body) = req.into_parts();
        let req_bytes = match Limited::new(body, MAX_REQUEST_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                info!(limit = MAX_REQUEST_BODY_BYTES, "request body too large");
                return ServerError::PayloadTooLarge.into_response();
            }
            Err(_) => Bytes::new(),
        };
        let private = PRIVATE_BODY_PATHS.contains(&parts.uri.path());
        log_body("request", &parts.headers, &req_bytes, private);
        let mut req = Request::from_parts(parts, Body::from(req_bytes));
        if let Some(value) = &trace_header {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(req).await;

        let mut response = if is_event_stream(response.headers()) {
            response
        } else {
            let (parts, body) = response.into_parts();
            let res_bytes = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
            log_body("response", &parts.headers, &res_bytes, false);
            Response::from_parts(parts, Body::from(res_bytes))
        };

        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );

        response
    }
    .instrument(span)
    .await
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"))
}

/// Log a buffered body when it is small JSON; otherwise log its size.
fn log_body(direction: &str, headers: &HeaderMap, bytes: &Bytes, private: bool) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_json = content_type.contains("application/json");

    if private {
        info!("{direction} body: [redacted: size={}]", bytes.len());
    } else if is_json && bytes.len() < LOG_BODY_LIMIT {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            info!("{direction} body: {text}");
        }
    } else if !bytes.is_empty() {
        info!(
            "{direction} body: [skipped: type={content_type}, size={}]",
            bytes.len()
        );
    }
}
