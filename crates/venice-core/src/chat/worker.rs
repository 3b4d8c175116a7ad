//! Generation worker thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ChatError;
use crate::engine::{EngineError, FragmentSink, SamplingConfig, TextGeneration};

/// Fragments buffered between the worker and the relay.
const FRAGMENT_BUFFER: usize = 32;

/// Keep the newest `max` tokens, dropping the oldest on overflow.
pub fn truncate_oldest(mut tokens: Vec<u32>, max: usize) -> Vec<u32> {
    if tokens.len() > max {
        tokens.drain(..tokens.len() - max);
    }
    tokens
}

/// A running generation: the worker thread and the fragments it produces.
pub(super) struct Generation {
    pub(super) handle: JoinHandle<Result<(), EngineError>>,
    pub(super) fragments: mpsc::Receiver<String>,
}

/// Everything the worker needs to run one generation job.
pub(super) struct Job {
    pub(super) provider: Arc<dyn TextGeneration>,
    pub(super) prompt: String,
    pub(super) max_input_tokens: usize,
    pub(super) sampling: SamplingConfig,
    pub(super) cancel: CancellationToken,
}

impl Job {
    fn run(self, sink: FragmentSink) -> Result<(), EngineError> {
        reclaim_memory(self.provider.as_ref(), "before generation");
        let encoded = self.provider.encode(&self.prompt)?;
        let encoded_len = encoded.len();
        let tokens = truncate_oldest(encoded, self.max_input_tokens);
        if tokens.len() < encoded_len {
            debug!(
                encoded = encoded_len,
                kept = tokens.len(),
                "prompt truncated to the newest tokens"
            );
        }
        self.provider.generate(&tokens, &self.sampling, &sink)
    }
}

/// Best-effort hint; blocking on accelerators, so never call it on the runtime.
pub(super) fn reclaim_memory(provider: &dyn TextGeneration, when: &'static str) {
    if let Err(e) = provider.reclaim_memory() {
        debug!(error = %e, when, "memory reclamation unsupported or failed");
    }
}

/// Start `job` on a dedicated OS thread.
pub(super) fn spawn(job: Job) -> Result<Generation, ChatError> {
    let (tx, fragments) = mpsc::channel(FRAGMENT_BUFFER);
    let sink = FragmentSink::new(tx, job.cancel.clone());
    let span = tracing::Span::current();

    let handle = thread::Builder::new()
        .name("venice-generate".into())
        .spawn(move || {
            let _entered = span.enter();
            job.run(sink)
        })
        .map_err(|source| ChatError::SpawnWorkerFailed { source })?;

    Ok(Generation { handle, fragments })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn truncate_keeps_short_input() {
        assert_eq!(truncate_oldest(vec![1, 2, 3], 8), vec![1, 2, 3]);
    }

    #[test]
    fn truncate_drops_oldest_tokens() {
        let tokens: Vec<u32> = (0..10).collect();
        assert_eq!(truncate_oldest(tokens, 4), vec![6, 7, 8, 9]);
    }

    #[test]
    fn truncate_at_exact_limit_is_noop() {
        assert_eq!(truncate_oldest(vec![5, 6], 2), vec![5, 6]);
    }
}
