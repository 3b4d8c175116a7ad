use std::sync::Mutex;

use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::decoder::TokenDecoder;
use super::loader::{Loader, ModelSource};
use crate::engine::{EngineError, FragmentSink, Quantization, SamplingConfig, TextGeneration};

/// A GGUF checkpoint loaded with candle.
///
/// The weights carry the KV cache, so generation is serialized behind a
/// mutex; the cache is reset at the start of every call.
pub struct CandleEngine {
    weights: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token: u32,
}

impl std::fmt::Debug for CandleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEngine")
            .field("device", &self.device)
            .field("eos_token", &self.eos_token)
            .finish_non_exhaustive()
    }
}

impl CandleEngine {
    /// Resolve, download if needed, and load the tokenizer and weights.
    ///
    /// Blocking; call from a blocking context.
    pub fn load(
        source: ModelSource,
        quantization: Quantization,
        device: Device,
        eos_token: &str,
    ) -> Result<Self, EngineError> {
        let mut loader = Loader::new(source);

        info!("loading tokenizer");
        let tokenizer = loader.tokenizer()?;

        info!(mode = %quantization, "using {}", quantization.describe());
        let weights = loader.weights(quantization, &device)?;

        Self::from_parts(weights, tokenizer, device, eos_token)
    }

    /// Assemble an engine from already loaded parts.
    pub fn from_parts(
        weights: ModelWeights,
        tokenizer: Tokenizer,
        device: Device,
        eos_token: &str,
    ) -> Result<Self, EngineError> {
        let eos_token = tokenizer
            .token_to_id(eos_token)
            .ok_or_else(|| EngineError::EosTokenMissing {
                token: eos_token.to_owned(),
            })?;
        Ok(Self {
            weights: Mutex::new(weights),
            tokenizer,
            device,
            eos_token,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn forward(
        &self,
        weights: &mut ModelWeights,
        tokens: &[u32],
        position: usize,
    ) -> Result<Tensor, EngineError> {
        let forward_err = |source: candle_core::Error| EngineError::ForwardFailed {
            position,
            source: source.into(),
        };
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(forward_err)?;
        weights
            .forward(&input, position)
            .and_then(|logits| logits.squeeze(0))
            .map_err(forward_err)
    }
}

impl TextGeneration for CandleEngine {
    fn encode(&self, text: &str) -> Result<Vec<u32>, EngineError> {
        self.tokenizer
            .encode(text, true)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| EngineError::TokenizeFailed {
                source: anyhow::anyhow!("failed to encode: {e}"),
            })
    }

    fn generate(
        &self,
        prompt_tokens: &[u32],
        sampling: &SamplingConfig,
        sink: &FragmentSink,
    ) -> Result<(), EngineError> {
        if prompt_tokens.is_empty() {
            return Err(EngineError::EmptyPrompt);
        }

        let mut weights = self.weights.lock().map_err(|_| EngineError::LockPoisoned {
            operation: "lock model weights",
        })?;
        let generated = run_token_loop(
            &self.tokenizer,
            self.eos_token,
            prompt_tokens,
            sampling,
            sink,
            |tokens, position| self.forward(&mut weights, tokens, position),
        )?;
        debug!(
            prompt_tokens = prompt_tokens.len(),
            generated, "generation finished"
        );
        Ok(())
    }

    fn reclaim_memory(&self) -> Result<(), EngineError> {
        if self.device.is_cpu() {
            return Ok(());
        }
        self.device
            .synchronize()
            .map_err(|e| EngineError::DeviceSync { source: e.into() })
    }
}

/// Prefill, then sample until EOS, `max_new_tokens`, or the sink stops.
///
/// `forward(tokens, position)` returns the logits for the last of `tokens`
/// placed at `position`; position 0 starts a fresh KV cache. Returns the
/// number of tokens generated.
fn run_token_loop<F>(
    tokenizer: &Tokenizer,
    eos_token: u32,
    prompt_tokens: &[u32],
    sampling: &SamplingConfig,
    sink: &FragmentSink,
    mut forward: F,
) -> Result<usize, EngineError>
where
    F: FnMut(&[u32], usize) -> Result<Tensor, EngineError>,
{
    if sampling.max_new_tokens == 0 {
        return Ok(0);
    }

    let mut processor = LogitsProcessor::from_sampling(sampling.seed, sampling.sampling());
    let mut decoder = TokenDecoder::new(tokenizer);
    let mut context = prompt_tokens.to_vec();

    let logits = forward(prompt_tokens, 0)?;
    let mut next = sample(&mut processor, logits, &context, sampling)?;
    let mut generated = 0usize;

    loop {
        if next == eos_token || sink.is_cancelled() {
            break;
        }
        context.push(next);
        generated += 1;

        if let Some(fragment) = decoder.next_token(next)? {
            if !sink.emit(fragment) {
                debug!(generated, "generation stopped by consumer");
                return Ok(generated);
            }
        }
        if generated >= sampling.max_new_tokens {
            break;
        }

        let position = prompt_tokens.len() + generated - 1;
        let logits = forward(&[next], position)?;
        next = sample(&mut processor, logits, &context, sampling)?;
    }

    if let Some(rest) = decoder.decode_rest()? {
        sink.emit(rest);
    }
    Ok(generated)
}

fn sample(
    processor: &mut LogitsProcessor,
    logits: Tensor,
    context: &[u32],
    sampling: &SamplingConfig,
) -> Result<u32, EngineError> {
    let sample_err = |source: candle_core::Error| EngineError::SampleFailed {
        source: source.into(),
    };
    let logits = if sampling.repeat_penalty == 1.0 {
        logits
    } else {
        let start_at = context.len().saturating_sub(sampling.repeat_last_n);
        candle_transformers::utils::apply_repeat_penalty(
            &logits,
            sampling.repeat_penalty,
            &context[start_at..],
        )
        .map_err(sample_err)?
    };
    processor.sample(&logits).map_err(sample_err)
}
