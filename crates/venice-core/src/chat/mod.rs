//! Conversation types and the chat turn orchestrator.

mod history;
mod service;
mod template;
mod worker;


use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::engine::EngineError;

pub use history::ConversationHistory;
pub use service::{ChatService, DEFAULT_SYSTEM_PROMPT, GenerationSettings};
pub use template::{ChatTemplate, Mistral, format_prompt};
pub use worker::truncate_oldest;

/// The role of a message author.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// The model has not finished loading.
    #[error("Model not loaded")]
    ModelNotReady,

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Admission was closed by [`ChatService::shutdown`].
    #[error("Chat service is shutting down")]
    Closed,

    #[error("Failed to spawn generation worker thread")]
    SpawnWorkerFailed {
        #[source]
        source: std::io::Error,
    },
}
