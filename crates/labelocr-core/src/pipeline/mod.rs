//! Upload -> OCR -> structured extraction orchestration.

mod upload;

pub use upload::{ScopedUpload, Upload, sanitize_filename};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{LabelError, ValidationError};
use crate::extraction::{StructuredExtractor, normalize};
use crate::models::{ExtractionSchema, StructuredRecord};
use crate::models::config::LabelConfig;
use crate::ocr::{OcrBackend, create_backend};

/// Progress of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    BackendSelected,
    TextExtracted,
    FieldsExtracted,
    Normalized,
    Completed,
    Errored,
}

impl Stage {
    /// Only the stages before extraction can end an invocation with an error;
    /// later failures are carried in the record.
    pub fn can_fail(self) -> bool {
        matches!(
            self,
            Stage::Received | Stage::BackendSelected | Stage::TextExtracted
        )
    }
}

/// Tracks and logs stage transitions for one upload.
struct Progress<'a> {
    stage: Stage,
    filename: &'a str,
}

impl<'a> Progress<'a> {
    fn start(filename: &'a str) -> Self {
        debug!(file = filename, "stage: {:?}", Stage::Received);
        Self {
            stage: Stage::Received,
            filename,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(file = self.filename, "stage: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        debug_assert!(self.stage.can_fail());
        warn!(file = self.filename, "failed at {:?}: {}", self.stage, error);
        self.stage = Stage::Errored;
        error
    }
}

/// Successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub success: bool,
    pub extracted_text: String,
    pub llm_output: StructuredRecord,
    pub filename: String,
}

/// Failed invocation, with the status a caller should report.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The upload was rejected before any work was done.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Storing, decoding or reading the image failed.
    #[error("Processing failed: {0}")]
    Processing(String),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Invalid(_) => 400,
            PipelineError::Processing(_) => 500,
        }
    }

    /// `{"error": message}`
    pub fn body(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl From<LabelError> for PipelineError {
    fn from(e: LabelError) -> Self {
        match e {
            LabelError::Validation(v) => PipelineError::Invalid(v),
            other => PipelineError::Processing(other.to_string()),
        }
    }
}

/// Static identifiers of the loaded components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub ocr_model: String,
    pub llm_model: String,
}

impl HealthReport {
    /// Report what `config` would load, without loading it.
    pub fn configured(config: &LabelConfig) -> Self {
        Self {
            status: "configured".to_string(),
            ocr_model: config.ocr.backend.model_name().to_string(),
            llm_model: config.extraction.model.clone(),
        }
    }
}

/// Immutable processing context built once at startup.
///
/// Holds the OCR backend and the extractor; share it behind an `Arc` to run
/// invocations concurrently. Decoding and OCR run on tokio's blocking pool so
/// they never stall tasks waiting on the extraction endpoint.
pub struct Pipeline {
    backend: Arc<dyn OcrBackend>,
    extractor: StructuredExtractor,
    allowed_extensions: Vec<String>,
    temp_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        backend: Box<dyn OcrBackend>,
        extractor: StructuredExtractor,
        config: &LabelConfig,
    ) -> Self {
        Self {
            backend: Arc::from(backend),
            extractor,
            allowed_extensions: config.upload.allowed_extensions.clone(),
            temp_dir: config.upload.temp_dir.clone(),
        }
    }

    /// Load the configured backend and extraction client.
    ///
    /// A missing credential only disables extraction; a backend that cannot
    /// be loaded is an error.
    pub fn from_config(config: &LabelConfig, api_key: Option<String>) -> Result<Self, LabelError> {
        let backend = create_backend(config)?;
        info!("OCR backend: {}", backend.name());

        let extractor = StructuredExtractor::from_config(&config.extraction, api_key)
            .map_err(|e| LabelError::Config(e.to_string()))?;

        Ok(Self::new(backend, extractor, config))
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "running".to_string(),
            ocr_model: self.backend.name().to_string(),
            llm_model: self.extractor.model().to_string(),
        }
    }

    /// Run one upload through OCR and structured extraction.
    ///
    /// Validation happens before anything touches the filesystem. Extraction
    /// failures never fail the invocation; they end up in `llm_output`.
    pub async fn process(&self, upload: Upload) -> Result<PipelineResponse, PipelineError> {
        let start = Instant::now();
        let label = upload.filename.clone().unwrap_or_default();
        let mut progress = Progress::start(&label);

        let (filename, bytes) = upload
            .validate(&self.allowed_extensions)
            .map_err(|e| progress.fail(e.into()))?;
        let filename = sanitize_filename(filename);

        let scoped = ScopedUpload::write(bytes, &filename, self.temp_dir.as_deref())
            .map_err(|e| progress.fail(e.into()))?;
        progress.advance(Stage::BackendSelected);

        // The temp file moves into the blocking task and is removed there.
        let backend = Arc::clone(&self.backend);
        let ocr = tokio::task::spawn_blocking(move || {
            let image = scoped.decode()?;
            backend.extract(&image).map_err(LabelError::from)
        })
        .await
        .map_err(|e| progress.fail(PipelineError::Processing(e.to_string())))?
        .map_err(|e| progress.fail(e.into()))?;

        info!(
            file = %filename,
            orientation = %ocr.orientation,
            chars = ocr.text.chars().count(),
            "Text extracted in {}ms",
            ocr.processing_time_ms
        );
        progress.advance(Stage::TextExtracted);

        let reply = self.extractor.extract_fields(&ocr.text).await;
        progress.advance(Stage::FieldsExtracted);

        let llm_output = match reply {
            Ok(reply) => normalize(&reply),
            Err(failure) => {
                warn!(file = %filename, "Structured extraction failed: {}", failure);
                StructuredRecord::error(failure.to_string())
            }
        };
        progress.advance(Stage::Normalized);

        match &llm_output {
            StructuredRecord::Fields(fields) if !ExtractionSchema::conforms(fields) => {
                warn!(
                    file = %filename,
                    missing = ?ExtractionSchema::missing_keys(fields),
                    extra = ?ExtractionSchema::extra_keys(fields),
                    "Model reply does not match the field schema"
                );
            }
            StructuredRecord::Fallback { .. } => {
                warn!(file = %filename, "Model reply was not a JSON object");
            }
            _ => {}
        }

        progress.advance(Stage::Completed);
        info!(
            file = %filename,
            "Processed in {}ms",
            start.elapsed().as_millis()
        );

        Ok(PipelineResponse {
            success: true,
            extracted_text: ocr.text,
            llm_output,
            filename,
        })
    }
}
