//! Device detection

use candle_core::{Device, utils};

use crate::engine::EngineError;

/// Pick the compute device: CUDA, then Metal, else CPU.
pub fn detect(force_cpu: bool) -> Result<Device, EngineError> {
    if force_cpu {
        return Ok(Device::Cpu);
    }
    if utils::cuda_is_available() {
        Device::new_cuda(0).map_err(|e| EngineError::InitializeDevice { source: e.into() })
    } else if utils::metal_is_available() {
        Device::new_metal(0).map_err(|e| EngineError::InitializeDevice { source: e.into() })
    } else {
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            tracing::warn!(
                "Running on CPU, to run on GPU(metal), build with `--features metal`"
            );
        }
        #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
        {
            tracing::warn!("Running on CPU, to run on GPU, build with `--features cuda`");
        }
        Ok(Device::Cpu)
    }
}
