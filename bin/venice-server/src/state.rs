//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use venice_core::ChatService;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// The conversation and the model it talks to.
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(config: Config, chat: ChatService) -> Self {
        Self {
            config: Arc::new(config),
            chat: Arc::new(chat),
        }
    }
}
