//! Model provider seam.
//!
//! [`TextGeneration`] is everything the chat orchestrator needs from a
//! loaded checkpoint. The candle implementation lives in [`candle`]; tests
//! substitute scripted providers.

pub mod candle;
mod errors;
mod quant;
mod sampling;
mod sink;

pub use errors::{EngineError, StreamChunk, StreamHandle};
pub use quant::Quantization;
pub use sampling::SamplingConfig;
pub use sink::FragmentSink;

/// A loaded model + tokenizer pair.
///
/// `generate` is blocking and runs on a dedicated worker thread.
pub trait TextGeneration: Send + Sync + 'static {
    /// Tokenize a fully formatted prompt.
    fn encode(&self, text: &str) -> Result<Vec<u32>, EngineError>;

    /// Generate a continuation of `prompt_tokens`, pushing text fragments
    /// into `sink` as they are produced.
    ///
    /// Returns `Ok(())` when generation finished normally or the sink asked
    /// to stop.
    fn generate(
        &self,
        prompt_tokens: &[u32],
        sampling: &SamplingConfig,
        sink: &FragmentSink,
    ) -> Result<(), EngineError>;

    /// Best-effort hint to release cached device memory.
    fn reclaim_memory(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
