//! Model lifecycle: `Unloaded → Loading → Ready`.
//!
//! There is no way back to `Unloaded` short of a process restart, and no
//! retry after a failed load: the caller treats a load fault as fatal.

use std::sync::{Arc, PoisonError, RwLock};

use strum::Display;
use tracing::info;

use crate::chat::ChatError;
use crate::engine::TextGeneration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
}

struct Slot {
    state: ModelState,
    provider: Option<Arc<dyn TextGeneration>>,
}

/// Holds the process-wide model once it is loaded.
pub struct ModelSlot {
    inner: RwLock<Slot>,
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelSlot({})", self.state())
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Slot {
                state: ModelState::Unloaded,
                provider: None,
            }),
        }
    }

    /// A slot that is already `Ready` with `provider`.
    pub fn ready(provider: Arc<dyn TextGeneration>) -> Self {
        let slot = Self::new();
        slot.install(provider);
        slot
    }

    pub fn state(&self) -> ModelState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    /// Mark the slot as loading. Has no effect once `Ready`.
    pub fn begin_loading(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if slot.state == ModelState::Unloaded {
            slot.state = ModelState::Loading;
            info!("model loading");
        }
    }

    /// Install the loaded provider and transition to `Ready`.
    pub fn install(&self, provider: Arc<dyn TextGeneration>) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.provider = Some(provider);
        slot.state = ModelState::Ready;
        info!("model ready");
    }

    /// The loaded provider, or [`ChatError::ModelNotReady`].
    pub fn provider(&self) -> Result<Arc<dyn TextGeneration>, ChatError> {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match (&slot.state, &slot.provider) {
            (ModelState::Ready, Some(provider)) => Ok(Arc::clone(provider)),
            _ => Err(ChatError::ModelNotReady),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::{EngineError, FragmentSink, SamplingConfig};

    struct Idle;

    impl TextGeneration for Idle {
        fn encode(&self, _text: &str) -> Result<Vec<u32>, EngineError> {
            Ok(vec![1])
        }

        fn generate(
            &self,
            _prompt_tokens: &[u32],
            _sampling: &SamplingConfig,
            _sink: &FragmentSink,
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn starts_unloaded_and_not_ready() {
        let slot = ModelSlot::new();
        assert_eq!(slot.state(), ModelState::Unloaded);
        assert!(!slot.is_ready());
        assert!(matches!(slot.provider(), Err(ChatError::ModelNotReady)));
    }

    #[test]
    fn loading_is_not_ready() {
        let slot = ModelSlot::new();
        slot.begin_loading();
        assert_eq!(slot.state(), ModelState::Loading);
        assert!(matches!(slot.provider(), Err(ChatError::ModelNotReady)));
    }

    #[test]
    fn install_transitions_to_ready() {
        let slot = ModelSlot::new();
        slot.begin_loading();
        slot.install(Arc::new(Idle));
        assert_eq!(slot.state(), ModelState::Ready);
        assert!(slot.provider().is_ok());
    }

    #[test]
    fn begin_loading_after_ready_is_ignored() {
        let slot = ModelSlot::ready(Arc::new(Idle));
        slot.begin_loading();
        assert_eq!(slot.state(), ModelState::Ready);
    }

    #[test]
    fn state_displays_lowercase() {
        assert_eq!(ModelState::Ready.to_string(), "ready");
        assert_eq!(ModelState::Unloaded.to_string(), "unloaded");
    }
}
