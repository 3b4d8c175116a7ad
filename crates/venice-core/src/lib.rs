pub mod chat;
pub mod engine;
pub mod lifecycle;

pub use chat::{ChatError, ChatService, GenerationSettings, Message, Role};
pub use engine::{
    EngineError, FragmentSink, Quantization, SamplingConfig, StreamChunk, StreamHandle,
    TextGeneration,
};
pub use lifecycle::{ModelSlot, ModelState};
