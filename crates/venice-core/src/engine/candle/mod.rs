//! Candle-backed [`TextGeneration`](super::TextGeneration) provider for GGUF
//! checkpoints.

mod decoder;
mod device;
mod engine;
mod loader;

pub use decoder::TokenDecoder;
pub use device::detect as detect_device;
pub use engine::CandleEngine;
pub use loader::{Loader, ModelSource};
