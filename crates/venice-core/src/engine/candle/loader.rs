//! Checkpoint resolution and loading.

use std::fs::File;
use std::path::{Path, PathBuf};

use candle_core::Device;
use candle_core::quantized::gguf_file;
use candle_transformers::models::quantized_llama::ModelWeights;
use hf_hub::api::sync::Api;
use tracing::info;

use crate::engine::{EngineError, Quantization};

/// Where the weights and tokenizer come from.
///
/// Local paths take precedence over the Hugging Face repositories.
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Repository holding the GGUF files.
    pub model_repo: String,
    /// GGUF file name for [`Quantization::Q4`].
    pub gguf_q4: String,
    /// GGUF file name for [`Quantization::Q8`].
    pub gguf_q8: String,
    /// GGUF file name for [`Quantization::Full`].
    pub gguf_full: String,
    /// Repository holding `tokenizer.json`.
    pub tokenizer_repo: String,
    /// Local GGUF file, bypassing the hub.
    pub model_path: Option<PathBuf>,
    /// Local `tokenizer.json`, bypassing the hub.
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ModelSource {
    fn default() -> Self {
        const GGUF_STEM: &str = "cognitivecomputations_Dolphin-Mistral-24B-Venice-Edition";
        Self {
            model_repo: format!("bartowski/{GGUF_STEM}-GGUF"),
            gguf_q4: format!("{GGUF_STEM}-Q4_K_M.gguf"),
            gguf_q8: format!("{GGUF_STEM}-Q8_0.gguf"),
            gguf_full: format!("{GGUF_STEM}-f16.gguf"),
            tokenizer_repo: "AskVenice/venice-uncensored".to_owned(),
            model_path: None,
            tokenizer_path: None,
        }
    }
}

impl ModelSource {
    /// GGUF file name for the requested quantization mode.
    pub fn gguf_file(&self, quantization: Quantization) -> &str {
        match quantization {
            Quantization::Q4 => &self.gguf_q4,
            Quantization::Q8 => &self.gguf_q8,
            Quantization::Full => &self.gguf_full,
        }
    }
}

/// Resolves artifacts for a [`ModelSource`] and loads them.
pub struct Loader {
    source: ModelSource,
    api: Option<Api>,
}

impl Loader {
    pub fn new(source: ModelSource) -> Self {
        Self { source, api: None }
    }

    fn fetch(&mut self, repo: &str, artifact: &str) -> Result<PathBuf, EngineError> {
        let fetch_err = |source: anyhow::Error| EngineError::FetchArtifact {
            repo: repo.to_owned(),
            artifact: artifact.to_owned(),
            source,
        };
        let api = match self.api.take() {
            Some(api) => api,
            None => Api::new().map_err(|e| fetch_err(e.into()))?,
        };
        info!(repo, artifact, "resolving artifact from hub");
        let fetched = api.model(repo.to_owned()).get(artifact);
        self.api = Some(api);
        fetched.map_err(|e| fetch_err(e.into()))
    }

    /// Path to the tokenizer, downloading it if needed.
    pub fn tokenizer_path(&mut self) -> Result<PathBuf, EngineError> {
        match self.source.tokenizer_path.clone() {
            Some(path) => Ok(path),
            None => {
                let repo = self.source.tokenizer_repo.clone();
                self.fetch(&repo, "tokenizer.json")
            }
        }
    }

    /// Path to the GGUF weights for `quantization`, downloading them if needed.
    pub fn model_path(&mut self, quantization: Quantization) -> Result<PathBuf, EngineError> {
        match self.source.model_path.clone() {
            Some(path) => Ok(path),
            None => {
                let repo = self.source.model_repo.clone();
                let file = self.source.gguf_file(quantization).to_owned();
                self.fetch(&repo, &file)
            }
        }
    }

    /// Load the tokenizer.
    pub fn tokenizer(&mut self) -> Result<tokenizers::Tokenizer, EngineError> {
        let path = self.tokenizer_path()?;
        tokenizers::Tokenizer::from_file(&path).map_err(|e| EngineError::LoadTokenizer {
            path: path.clone(),
            source: anyhow::anyhow!("failed to load tokenizer: {e}"),
        })
    }

    /// Load the GGUF weights onto `device`.
    pub fn weights(
        &mut self,
        quantization: Quantization,
        device: &Device,
    ) -> Result<ModelWeights, EngineError> {
        let path = self.model_path(quantization)?;
        read_gguf(&path, device)
    }
}

fn read_gguf(path: &Path, device: &Device) -> Result<ModelWeights, EngineError> {
    let load_err = |source: anyhow::Error| EngineError::LoadModel {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(|e| load_err(e.into()))?;
    let content = gguf_file::Content::read(&mut file).map_err(|e| load_err(e.into()))?;
    info!(
        path = %path.display(),
        tensors = content.tensor_infos.len(),
        "read gguf header"
    );
    ModelWeights::from_gguf(content, &mut file, device).map_err(|e| load_err(e.into()))
}
