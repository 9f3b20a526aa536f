//! ONNX inference abstraction layer for labelocr.
//!
//! The deep OCR backend talks to its detection, line-direction and
//! recognition models only through [`InferenceBackend`], so the models can be
//! swapped for in-memory fakes in tests. Native builds run models with `ort`
//! and the XNNPACK execution provider.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
