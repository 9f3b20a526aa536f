//! ONNX Runtime (ort) backend for native platforms with XNNPACK.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use tracing::debug;

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

/// Backend running one ONNX model through ONNX Runtime.
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex; callers
/// share the backend by reference.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
}

impl OrtBackend {
    /// Load a model file with the given number of intra-op threads.
    pub fn from_file<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InferenceError::MissingModel(path.to_path_buf()));
        }
        debug!("Loading ONNX model from: {}", path.display());

        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, threads)
    }

    /// Load a model from memory.
    pub fn from_bytes(bytes: &[u8], threads: usize) -> Result<Self> {
        debug!("Loading ONNX model from {} bytes", bytes.len());

        let session = Session::builder()
            .map_err(session_err)?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(session_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(session_err)?
            .with_intra_threads(threads.max(1))
            .map_err(session_err)?
            .commit_from_memory(bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        debug!("Model inputs: {:?}", input_names);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
        })
    }
}

fn session_err(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::SessionCreate(e.to_string())
}

fn to_session_input(tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
    match tensor {
        InputTensor::Float32(arr) => {
            let shape: Vec<i64> = arr.shape().iter().map(|&s| s as i64).collect();
            let data: Vec<f32> = arr.iter().copied().collect();
            Tensor::from_array((shape, data))
                .map(Into::into)
                .map_err(|e| InferenceError::InvalidInput(e.to_string()))
        }
    }
}

fn to_array<T: Clone>(shape: &[i64], data: &[T]) -> Result<ArrayD<T>> {
    let shape: Vec<usize> = shape.iter().map(|&s| s as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
        .map_err(|e| InferenceError::OutputExtraction(e.to_string()))
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, to_session_input(tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::InferenceFailed(format!("session lock poisoned: {}", e)))?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                OutputTensor::Float32(to_array(shape, data)?)
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                OutputTensor::Int64(to_array(shape, data)?)
            } else {
                return Err(InferenceError::OutputExtraction(format!(
                    "unsupported output type for '{}'",
                    name
                )));
            };
            results.push((name.to_string(), tensor));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }
}
