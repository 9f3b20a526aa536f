//! Tensor types passed across the inference boundary.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Input tensor for inference.
///
/// The OCR models only consume NCHW float images, so a single variant is
/// enough; new variants go here when a model needs them.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
}

impl InputTensor {
    /// Build a Float32 tensor from flat data and a shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
        }
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Consume the tensor, returning the Float32 array or an error naming
    /// the actual element type.
    pub fn into_f32(self) -> Result<ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Ok(arr),
            OutputTensor::Int64(_) => Err(InferenceError::OutputExtraction(
                "expected f32 output, got i64".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_f32_checks_shape() {
        let tensor = InputTensor::from_f32(vec![0.0; 6], &[1, 2, 3]).unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3]);

        assert!(InputTensor::from_f32(vec![0.0; 5], &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_into_f32_rejects_int_output() {
        let ints = OutputTensor::Int64(ArrayD::zeros(IxDyn(&[2])));
        assert!(ints.into_f32().is_err());

        let floats = OutputTensor::Float32(ArrayD::zeros(IxDyn(&[1, 4])));
        assert_eq!(floats.into_f32().unwrap().shape(), &[1, 4]);
    }
}
