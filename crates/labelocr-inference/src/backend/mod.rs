//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// A loaded model that can be run on named inputs.
///
/// Implementations must be shareable across threads: one backend is built at
/// startup and then used by every concurrent pipeline invocation.
pub trait InferenceBackend: Send + Sync {
    /// Run the model on named inputs and return its named outputs in model
    /// order.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Run a single-input model and return its first output.
    ///
    /// The input is bound to the model's first declared input name, falling
    /// back to `"x"` (the PaddleOCR export convention) when the model does not
    /// report one.
    fn run_single(&self, input: InputTensor) -> Result<OutputTensor> {
        let name = self
            .input_names()
            .first()
            .map(String::as_str)
            .unwrap_or("x")
            .to_string();

        self.run(&[(name.as_str(), input)])?
            .into_iter()
            .next()
            .map(|(_, tensor)| tensor)
            .ok_or(crate::InferenceError::NoOutputs)
    }
}
