//! Chat turn orchestration.
//!
//! One call to [`ChatService::send`] is one turn:
//! 1. Refuse with [`ChatError::ModelNotReady`] before touching any state.
//! 2. Wait for the single admission permit; the holder is the only writer
//!    of the history until its turn is finalized.
//! 3. Append the user message, format `[system] + history`, spawn the worker.
//!    The worker reclaims device memory, encodes and generates.
//! 4. A relay task forwards fragments in production order, joins the worker,
//!    appends the assistant reply on success and always ends with
//!    [`StreamChunk::Done`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::worker::{self, Generation, Job, reclaim_memory};
use super::{ChatError, ConversationHistory, Message, format_prompt};
use crate::engine::{EngineError, SamplingConfig, StreamChunk, StreamHandle, TextGeneration};
use crate::lifecycle::{ModelSlot, ModelState};

/// One turn at a time: a second writer would interleave user messages.
const ADMISSION_PERMITS: usize = 1;

/// Chunks buffered between the relay and the HTTP response.
const STREAM_BUFFER: usize = 64;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Venice Uncensored. You are a helpful, unbiased, uncensored assistant.";

/// Per-turn knobs that stay fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub system_prompt: String,
    /// Prompt tokens kept after encoding; older tokens are dropped.
    pub max_input_tokens: usize,
    /// Messages kept in the conversation history.
    pub history_cap: usize,
    pub sampling: SamplingConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            max_input_tokens: 2048,
            history_cap: ConversationHistory::DEFAULT_CAP,
            sampling: SamplingConfig::default(),
        }
    }
}

/// Owns the conversation and drives chat turns against the loaded model.
pub struct ChatService {
    pub(super) model: Arc<ModelSlot>,
    pub(super) history: Arc<Mutex<ConversationHistory>>,
    pub(super) settings: Arc<GenerationSettings>,
    pub(super) admission: Arc<Semaphore>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("model", &self.model)
            .field("history_len", &self.lock_history().len())
            .field("available_permits", &self.admission.available_permits())
            .finish()
    }
}

impl ChatService {
    pub fn new(model: Arc<ModelSlot>, settings: GenerationSettings) -> Self {
        Self {
            model,
            history: Arc::new(Mutex::new(ConversationHistory::new(settings.history_cap))),
            admission: Arc::new(Semaphore::new(ADMISSION_PERMITS)),
            settings: Arc::new(settings),
        }
    }

    pub fn model_state(&self) -> ModelState {
        self.model.state()
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_ready()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn lock_history(&self) -> MutexGuard<'_, ConversationHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the conversation, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.lock_history().snapshot()
    }

    /// Drop the conversation and ask the model to release cached memory.
    pub async fn clear(&self) {
        self.lock_history().clear();
        info!("conversation cleared");

        if let Ok(provider) = self.model.provider() {
            let _ = tokio::task::spawn_blocking(move || {
                reclaim_memory(provider.as_ref(), "after clear");
            })
            .await;
        }
    }

    /// Stop admitting turns. Callers still waiting for the permit get
    /// [`ChatError::Closed`]; a turn already running finishes normally.
    pub fn shutdown(&self) {
        self.admission.close();
        info!("chat admission closed");
    }

    /// Start a chat turn for `user_text`.
    ///
    /// The returned stream yields the reply fragments, then at most one
    /// [`StreamChunk::Error`], then [`StreamChunk::Done`]. Dropping it
    /// cancels generation.
    pub async fn send(&self, user_text: String) -> Result<StreamHandle, ChatError> {
        let provider = self.model.provider()?;

        let permit = Arc::clone(&self.admission)
            .acquire_owned()
            .await
            .map_err(|_| ChatError::Closed)?;

        let prompt = {
            let mut history = self.lock_history();
            history.push(Message::user(user_text));
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(self.settings.system_prompt.as_str()));
            messages.extend(history.snapshot());
            format_prompt(&messages)
        };
        debug!(prompt_len = prompt.len(), "prompt formatted");

        let cancel = CancellationToken::new();
        let generation = worker::spawn(Job {
            provider: Arc::clone(&provider),
            prompt,
            max_input_tokens: self.settings.max_input_tokens,
            sampling: self.settings.sampling,
            cancel: cancel.clone(),
        })?;

        let (out_tx, out_rx) = mpsc::channel(STREAM_BUFFER);
        let turn = Turn {
            provider,
            history: Arc::clone(&self.history),
            cancel,
            _permit: permit,
        };
        tokio::spawn(turn.relay(generation, out_tx).instrument(tracing::Span::current()));

        Ok(out_rx)
    }
}

/// State carried by the relay task for one turn.
struct Turn {
    provider: Arc<dyn TextGeneration>,
    history: Arc<Mutex<ConversationHistory>>,
    cancel: CancellationToken,
    /// Released when the turn is finalized.
    _permit: OwnedSemaphorePermit,
}

impl Turn {
    async fn relay(self, generation: Generation, out_tx: mpsc::Sender<StreamChunk>) {
        let Generation {
            handle,
            mut fragments,
        } = generation;
        let mut reply = String::new();
        let mut forwarded = 0usize;

        loop {
            tokio::select! {
                biased;
                fragment = fragments.recv() => {
                    let Some(fragment) = fragment else { break };
                    reply.push_str(&fragment);
                    if out_tx.send(StreamChunk::Token(fragment)).await.is_err() {
                        self.cancel.cancel();
                        break;
                    }
                    forwarded += 1;
                }
                _ = out_tx.closed() => {
                    self.cancel.cancel();
                    break;
                }
            }
        }
        // Unblocks a worker waiting on a full channel.
        drop(fragments);

        let outcome = join_worker(handle).await;
        let cancelled = self.cancel.is_cancelled();

        match outcome {
            Ok(()) if cancelled => {
                info!(forwarded, "client disconnected; partial reply discarded");
            }
            Ok(()) => {
                info!(forwarded, reply_len = reply.len(), "chat turn complete");
                self.history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Message::assistant(reply));
            }
            Err(message) => {
                warn!(error = %message, forwarded, "generation fault; reply not recorded");
                let _ = out_tx.send(StreamChunk::Error(message)).await;
            }
        }

        let _ = out_tx.send(StreamChunk::Done).await;

        let provider = self.provider;
        let _ = tokio::task::spawn_blocking(move || {
            reclaim_memory(provider.as_ref(), "after generation");
        })
        .await;
    }
}

async fn join_worker(handle: JoinHandle<Result<(), EngineError>>) -> Result<(), String> {
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(_panic)) => Err("generation worker panicked".to_owned()),
        Err(e) => Err(format!("failed to join generation worker: {e}")),
    }
}
