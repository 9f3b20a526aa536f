//! Core library for product label OCR.
//!
//! This crate provides:
//! - Interchangeable OCR backends (PaddleOCR over ONNX Runtime, `pure-onnx-ocr`,
//!   Tesseract with a four-way orientation search)
//! - Structured field extraction through an OpenAI-compatible chat endpoint
//! - Normalization of model replies into a fixed six-field record
//! - A [`Pipeline`] tying upload validation, OCR and extraction together

pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pipeline;

pub use error::{
    CompletionError, ExtractionFailure, LabelError, OcrError, Result, ValidationError,
};
pub use extraction::{StructuredExtractor, normalize, strip_code_fence};
pub use models::{BackendKind, ExtractionSchema, LabelConfig, ProductLabel, StructuredRecord};
pub use ocr::{OcrBackend, OcrResult, OrientationSearch, Rotation, create_backend};
pub use pipeline::{HealthReport, Pipeline, PipelineError, PipelineResponse, Upload};
