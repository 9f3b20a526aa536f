//! Error types for the labelocr-core library.

use thiserror::Error;

/// Main error type for the labelocr library.
#[derive(Error, Debug)]
pub enum LabelError {
    /// Upload rejected before any processing.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons an upload is rejected before it touches the filesystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No image payload was supplied.
    #[error("No image file provided")]
    MissingFile,

    /// A payload was supplied with an empty filename.
    #[error("No file selected")]
    EmptyFilename,

    /// The filename extension is not an accepted image type.
    #[error("Invalid file type '{0}'. Supported formats: PNG, JPG, GIF, BMP, TIFF, WebP")]
    UnsupportedExtension(String),
}

/// Errors raised by OCR backends.
#[derive(Error, Debug)]
pub enum OcrError {
    /// A model or engine could not be loaded. Fatal at startup.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The engine failed on this input.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

#[cfg(feature = "native")]
impl From<labelocr_inference::InferenceError> for OcrError {
    fn from(e: labelocr_inference::InferenceError) -> Self {
        use labelocr_inference::InferenceError;

        match e {
            InferenceError::MissingModel(_)
            | InferenceError::ModelLoad(_)
            | InferenceError::SessionCreate(_)
            | InferenceError::Io(_) => OcrError::BackendUnavailable(e.to_string()),
            _ => OcrError::ExtractionFailed(e.to_string()),
        }
    }
}

/// Failures talking to the chat-completion endpoint.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The endpoint rejected the credential (401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request did not finish within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Connection or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not a chat completion.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Why structured extraction produced no model reply.
///
/// Rendered into the `{error}` record; never propagated as a fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// No credential was available at startup.
    #[error("not configured")]
    NotConfigured,

    /// The endpoint rejected the credential.
    #[error("invalid credential")]
    InvalidCredential,

    #[error("{0}")]
    Failed(String),
}

impl From<CompletionError> for ExtractionFailure {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Unauthorized(_) => ExtractionFailure::InvalidCredential,
            other => ExtractionFailure::Failed(other.to_string()),
        }
    }
}

/// Result type for the labelocr library.
pub type Result<T> = std::result::Result<T, LabelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extraction_failure_messages() {
        assert_eq!(ExtractionFailure::NotConfigured.to_string(), "not configured");
        assert_eq!(
            ExtractionFailure::from(CompletionError::Unauthorized("bad token".into())),
            ExtractionFailure::InvalidCredential
        );
        assert_eq!(
            ExtractionFailure::from(CompletionError::Timeout(60)).to_string(),
            "request timed out after 60s"
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::UnsupportedExtension("exe".into()).to_string(),
            "Invalid file type 'exe'. Supported formats: PNG, JPG, GIF, BMP, TIFF, WebP"
        );
    }
}
