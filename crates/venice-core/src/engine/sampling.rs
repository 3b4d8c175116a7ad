use candle_transformers::generation::Sampling;

/// Generation parameters for one chat turn.
///
/// Defaults keep output near-deterministic and bounded in length so that a
/// turn has predictable latency and memory use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// Upper bound on generated tokens.
    pub max_new_tokens: usize,
    /// Softmax temperature; `<= 0` selects greedy decoding.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Penalty applied to recently generated tokens; `1.0` disables it.
    pub repeat_penalty: f32,
    /// Window the repetition penalty looks back over.
    pub repeat_last_n: usize,
    /// RNG seed for the sampler.
    pub seed: u64,
}

impl SamplingConfig {
    /// Candle sampling strategy. Single sequence, no beam search.
    pub fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            Sampling::ArgMax
        } else if self.top_p >= 1.0 {
            Sampling::All {
                temperature: self.temperature,
            }
        } else {
            Sampling::TopP {
                p: self.top_p,
                temperature: self.temperature,
            }
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.15,
            top_p: 0.95,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            seed: 299_792_458,
        }
    }
}
