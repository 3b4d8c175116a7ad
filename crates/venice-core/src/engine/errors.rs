use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to resolve {artifact} from {repo}")]
    FetchArtifact {
        repo: String,
        artifact: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load tokenizer from: {path}")]
    LoadTokenizer {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load model from: {path}")]
    LoadModel {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to initialize compute device")]
    InitializeDevice {
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to synchronize compute device")]
    DeviceSync {
        #[source]
        source: anyhow::Error,
    },

    #[error("End-of-sequence token {token:?} is not in the tokenizer vocabulary")]
    EosTokenMissing { token: String },

    #[error("Failed to tokenize prompt")]
    TokenizeFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to decode generated tokens")]
    DecodeFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("Forward pass failed at position {position}")]
    ForwardFailed {
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to sample next token")]
    SampleFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("Prompt is empty after tokenization")]
    EmptyPrompt,

    #[error("Lock poisoned while trying to {operation}")]
    LockPoisoned { operation: &'static str },
}

/// A chunk of streaming output for one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A piece of generated text.
    Token(String),
    /// Generation terminated due to an error. Always followed by [`StreamChunk::Done`].
    Error(String),
    /// End of the turn. Always the last chunk.
    Done,
}

/// A handle to a streaming generation response.
///
/// Yields [`StreamChunk`] items as fragments are produced. The stream ends
/// with [`StreamChunk::Done`], optionally preceded by one [`StreamChunk::Error`].
pub type StreamHandle = mpsc::Receiver<StreamChunk>;
