//! Chat routes: streaming turns, clearing and inspecting the conversation.
//!
//! `POST /api/chat` answers with server-sent events:
//!
//! ```text
//! data: {"token": "Hi"}
//! data: {"token": " there"}
//! data: [DONE]
//! ```
//!
//! A mid-stream fault adds one `data: {"error": "..."}` event before
//! `[DONE]`. Closing the connection cancels generation.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use utoipa::OpenApi;
use venice_core::StreamChunk;

use crate::error::ServerError;
use crate::schemas::chat::{ChatRequest, ClearResponse, HistoryMessage, HistoryResponse};
use crate::state::AppState;

/// Maximum accepted message length in bytes.
const MAX_MESSAGE_BYTES: usize = 128 * 1024;

/// Terminal SSE payload.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(OpenApi)]
#[openapi(
    paths(chat, clear, history),
    components(schemas(ChatRequest, ClearResponse, HistoryResponse, HistoryMessage))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/clear", get(clear))
        .route("/api/history", get(history))
}

/// Run one chat turn and stream the reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply fragments as server-sent events", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Message too large"),
        (status = 413, description = "Request body too large"),
        (status = 503, description = "Model not loaded"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    if req.message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {MAX_MESSAGE_BYTES} bytes",
            req.message.len(),
        )));
    }

    debug!(message_len = req.message.len(), "chat request");
    let chunks = state.chat.send(req.message).await?;

    let events =
        ReceiverStream::new(chunks).map(|chunk| Ok::<Event, Infallible>(to_event(chunk)));
    Ok(Sse::new(events))
}

fn to_event(chunk: StreamChunk) -> Event {
    let data = match chunk {
        StreamChunk::Token(token) => json!({ "token": token }).to_string(),
        StreamChunk::Error(error) => json!({ "error": error }).to_string(),
        StreamChunk::Done => DONE_SENTINEL.to_owned(),
    };
    Event::default().data(data)
}

/// Forget the conversation.
#[utoipa::path(
    get,
    path = "/api/clear",
    tag = "chat",
    responses((status = 200, description = "Conversation cleared", body = ClearResponse))
)]
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    state.chat.clear().await;
    Json(ClearResponse::cleared())
}

/// The current conversation, oldest first.
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "chat",
    responses((status = 200, description = "Conversation history", body = HistoryResponse))
)]
pub async fn history(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state
            .chat
            .history()
            .into_iter()
            .map(HistoryMessage::from)
            .collect(),
    })
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    use crate::routes;
    use crate::state::{AppState, testing};

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    async fn call(state: &std::sync::Arc<AppState>, request: Request<Body>) -> Response {
        routes::build(state.clone()).oneshot(request).await.unwrap()
    }

    /// `data:` payloads of an SSE body, in order.
    fn sse_data(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.trim_start().to_owned())
            .collect()
    }

    #[tokio::test]
    #[traced_test]
    async fn chat_streams_tokens_then_done_and_records_history() {
        let state = testing::ready_state(&["Hi", " there"]);

        let response = call(&state, post_chat(r#"{"message": "hello"}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert!(response.headers().contains_key("x-trace-id"));

        let events = sse_data(&body_text(response).await);
        assert_eq!(
            events,
            vec![
                r#"{"token":"Hi"}"#.to_owned(),
                r#"{"token":" there"}"#.to_owned(),
                "[DONE]".to_owned(),
            ]
        );

        let history = body_json(call(&state, get("/api/history")).await).await;
        assert_eq!(
            history,
            serde_json::json!({"history": [
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": "Hi there"},
            ]})
        );
        assert!(logs_contain("request started"));
    }

    #[tokio::test]
    async fn chat_without_model_is_503_and_leaves_history_alone() {
        let state = testing::unloaded_state();

        let response = call(&state, post_chat(r#"{"message": "hello"}"#)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Model not loaded"})
        );

        let history = body_json(call(&state, get("/api/history")).await).await;
        assert_eq!(history["history"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn chat_fault_emits_error_event_before_done() {
        let state = testing::failing_state(&["par", "tial"]);

        let response = call(&state, post_chat(r#"{"message": "hello"}"#)).await;
        let events = sse_data(&body_text(response).await);

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], r#"{"token":"par"}"#);
        assert_eq!(events[1], r#"{"token":"tial"}"#);
        let error: Value = serde_json::from_str(&events[2]).unwrap();
        assert!(error["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(events[3], "[DONE]");

        let history = body_json(call(&state, get("/api/history")).await).await;
        assert_eq!(
            history["history"],
            serde_json::json!([{"role": "user", "content": "hello"}])
        );
    }

    #[tokio::test]
    async fn missing_message_field_is_an_empty_message() {
        let state = testing::ready_state(&["ok"]);

        let response = call(&state, post_chat("{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await;

        let history = body_json(call(&state, get("/api/history")).await).await;
        assert_eq!(history["history"][0]["content"], "");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let state = testing::ready_state(&["ok"]);
        let response = call(&state, post_chat("not json")).await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let state = testing::ready_state(&["ok"]);
        let body = serde_json::json!({ "message": "x".repeat(super::MAX_MESSAGE_BYTES + 1) });

        let response = call(&state, post_chat(&body.to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_over_the_request_limit_is_413() {
        let state = testing::ready_state(&["ok"]);
        let limit = crate::middleware::trace::MAX_REQUEST_BODY_BYTES;
        let body = serde_json::json!({ "message": "x".repeat(limit) });

        let response = call(&state, post_chat(&body.to_string())).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["error"], "request body too large");

        let history = body_json(call(&state, get("/api/history")).await).await;
        assert_eq!(history, serde_json::json!({"history": []}));
    }

    #[tokio::test]
    #[traced_test]
    async fn chat_request_text_is_not_logged() {
        let state = testing::ready_state(&["ok"]);

        let response = call(&state, post_chat(r#"{"message": "my-secret-passphrase"}"#)).await;
        body_text(response).await;

        assert!(logs_contain("request body: [redacted: size="));
        assert!(!logs_contain("my-secret-passphrase"));
    }

    #[tokio::test]
    async fn chat_after_shutdown_is_503() {
        let state = testing::ready_state(&["ok"]);
        state.chat.shutdown();

        let response = call(&state, post_chat(r#"{"message": "hello"}"#)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "server is shutting down");
    }

    #[tokio::test]
    async fn clear_empties_history_and_is_idempotent() {
        let state = testing::ready_state(&["hi"]);
        body_text(call(&state, post_chat(r#"{"message": "hello"}"#)).await).await;

        for _ in 0..2 {
            let response = call(&state, get("/api/clear")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_json(response).await,
                serde_json::json!({"status": "memory cleared", "conversation_cleared": true})
            );

            let history = body_json(call(&state, get("/api/history")).await).await;
            assert_eq!(history, serde_json::json!({"history": []}));
        }
    }

    #[tokio::test]
    async fn four_turns_keep_the_last_six_messages() {
        let state = testing::ready_state(&["r"]);
        for turn in 1..=4 {
            let body = format!(r#"{{"message": "m{turn}"}}"#);
            body_text(call(&state, post_chat(&body)).await).await;
        }

        let history = body_json(call(&state, get("/api/history")).await).await;
        let entries = history["history"].as_array().unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0]["content"], "m2");
        assert_eq!(entries[4]["content"], "m4");
        assert_eq!(entries[5]["role"], "assistant");
    }

    #[tokio::test]
    async fn status_and_index_are_served() {
        let state = testing::ready_state(&["ok"]);

        let status = body_json(call(&state, get("/api/status")).await).await;
        assert_eq!(status, serde_json::json!({"loaded": true}));

        let page = call(&state, get("/")).await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(body_text(page).await.contains("<html"));
    }

    #[tokio::test]
    async fn openapi_document_is_served_when_enabled() {
        let state = testing::ready_state(&["ok"]);
        let response = call(&state, get("/api-docs/openapi.json")).await;

        if state.config.enable_docs {
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_json(response).await["paths"]["/api/chat"].is_object());
        } else {
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
