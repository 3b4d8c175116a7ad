use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use venice_core::Message;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message. Missing means empty.
    #[serde(default)]
    pub message: String,
}

/// Response body for `GET /api/status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// `true` once the model is ready to generate.
    pub loaded: bool,
}

/// Response body for `GET /api/clear`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearResponse {
    /// Always `"memory cleared"`.
    pub status: String,
    pub conversation_cleared: bool,
}

impl ClearResponse {
    pub fn cleared() -> Self {
        Self {
            status: "memory cleared".into(),
            conversation_cleared: true,
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl From<Message> for HistoryMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content,
        }
    }
}

/// Response body for `GET /api/history`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    /// Oldest first.
    pub history: Vec<HistoryMessage>,
}
