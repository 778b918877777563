//! Detection backends.
//!
//! The pipeline treats the detector as a black box: RGB pixels in,
//! frame-space detections out. `stub://` model paths select the procedural
//! stub backend; real paths load an ONNX model via tract when the
//! `backend-tract` feature is enabled.

mod backend;
mod backends;
mod result;

use anyhow::Result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{class_name, Detection, CLASS_NAMES};

/// Model input edge used by the ONNX backend.
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;

/// Load a detector backend for a model path.
///
/// Load failures are fatal to the run that requested them; callers log the
/// error and never start the pipeline.
pub fn load_backend(model_path: &str) -> Result<Box<dyn DetectorBackend>> {
    if model_path.starts_with("stub://") {
        log::info!("detector: using stub backend for {}", model_path);
        return Ok(Box::new(StubBackend::new()));
    }

    #[cfg(feature = "backend-tract")]
    {
        let backend = TractBackend::new(model_path, DEFAULT_MODEL_INPUT_SIZE)?;
        log::info!("detector: loaded ONNX model from {}", model_path);
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow::anyhow!(
            "loading model '{}' requires the backend-tract feature",
            model_path
        ))
    }
}
