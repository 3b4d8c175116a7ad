//! Server configuration, loaded from `VENICE_*` environment variables at
//! startup and optionally overridden on the command line.

use std::path::PathBuf;

use clap::Parser;
use venice_core::engine::candle::ModelSource;
use venice_core::{GenerationSettings, Quantization, SamplingConfig};

/// Command-line overrides. Anything not given here comes from the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "venice-server", version)]
#[command(about = "Streaming chat server for a quantized Venice Uncensored checkpoint", long_about = None)]
pub struct Args {
    /// Address to bind, e.g. `127.0.0.1:5000`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Weight precision: `4bit`, `8bit` or `full`.
    #[arg(long)]
    pub quantization: Option<Quantization>,

    /// Run on the CPU even when an accelerator is available.
    #[arg(long)]
    pub cpu: bool,
}

/// Runtime configuration for venice-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// Which GGUF file to load (default: 4-bit).
    pub quantization: Quantization,

    /// Hub repositories or local paths for the weights and tokenizer.
    pub source: ModelSource,

    /// End-of-sequence token text (default: `"</s>"`).
    pub eos_token: String,

    /// Prompt, history and sampling settings handed to the chat service.
    pub generation: GenerationSettings,

    /// Skip accelerator detection and run on the CPU.
    pub force_cpu: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; unset allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let source = ModelSource::default();
        let sampling = SamplingConfig::default();
        let generation = GenerationSettings::default();

        Self {
            bind_address: env_or("VENICE_BIND", "0.0.0.0:5000"),
            quantization: parse_env("VENICE_QUANTIZATION", Quantization::default()),
            source: ModelSource {
                model_repo: env_or("VENICE_MODEL_REPO", &source.model_repo),
                gguf_q4: env_or("VENICE_GGUF_Q4", &source.gguf_q4),
                gguf_q8: env_or("VENICE_GGUF_Q8", &source.gguf_q8),
                gguf_full: env_or("VENICE_GGUF_FULL", &source.gguf_full),
                tokenizer_repo: env_or("VENICE_TOKENIZER_REPO", &source.tokenizer_repo),
                model_path: env_path("VENICE_MODEL_PATH"),
                tokenizer_path: env_path("VENICE_TOKENIZER_PATH"),
            },
            eos_token: env_or("VENICE_EOS_TOKEN", "</s>"),
            generation: GenerationSettings {
                system_prompt: env_or("VENICE_SYSTEM_PROMPT", &generation.system_prompt),
                max_input_tokens: parse_env("VENICE_MAX_INPUT_TOKENS", generation.max_input_tokens),
                history_cap: parse_env("VENICE_HISTORY_CAP", generation.history_cap),
                sampling: SamplingConfig {
                    max_new_tokens: parse_env("VENICE_MAX_NEW_TOKENS", sampling.max_new_tokens),
                    temperature: parse_env("VENICE_TEMPERATURE", sampling.temperature),
                    top_p: parse_env("VENICE_TOP_P", sampling.top_p),
                    repeat_penalty: parse_env("VENICE_REPEAT_PENALTY", sampling.repeat_penalty),
                    repeat_last_n: parse_env("VENICE_REPEAT_LAST_N", sampling.repeat_last_n),
                    seed: parse_env("VENICE_SEED", sampling.seed),
                },
            },
            force_cpu: env_flag("VENICE_CPU", false),
            log_level: env_or("VENICE_LOG", "info"),
            log_json: env_flag("VENICE_LOG_JSON", false),
            cors_allowed_origins: std::env::var("VENICE_CORS_ORIGINS").ok(),
            enable_docs: env_flag("VENICE_ENABLE_DOCS", true),
        }
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_args(mut self, args: Args) -> Self {
        if let Some(bind) = args.bind {
            self.bind_address = bind;
        }
        if let Some(quantization) = args.quantization {
            self.quantization = quantization;
        }
        self.force_cpu |= args.cpu;
        self
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
