//! Error types for the inference layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or running one of the OCR models.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model file not found: {}", .0.display())]
    MissingModel(PathBuf),

    /// ONNX Runtime could not build a session from the model bytes.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("failed to configure session: {0}")]
    SessionCreate(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model produced no outputs")]
    NoOutputs,

    /// Output tensor has an element type or shape we cannot read.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
