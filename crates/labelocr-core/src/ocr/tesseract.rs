//! Tesseract engine via `leptess`.

use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat};
use leptess::LepTess;
use tracing::{debug, info};

use crate::error::OcrError;

use super::hocr::word_confidences;
use super::orientation::ClassicalEngine;

/// A Tesseract instance initialized once and shared by every invocation.
///
/// The C API keeps the current image on the handle, so calls are serialized
/// through a mutex.
pub struct TesseractEngine {
    api: Mutex<LepTess>,
}

impl TesseractEngine {
    /// Initialize Tesseract with `language` traineddata from `tessdata_dir`
    /// (or the system default location).
    pub fn new(tessdata_dir: Option<&Path>, language: &str) -> Result<Self, OcrError> {
        let data_path = tessdata_dir.map(|p| p.to_string_lossy().into_owned());

        let api = LepTess::new(data_path.as_deref(), language).map_err(|e| {
            OcrError::BackendUnavailable(format!(
                "failed to initialize Tesseract ({}): {}",
                language, e
            ))
        })?;

        info!("Initialized Tesseract with language '{}'", language);

        Ok(Self {
            api: Mutex::new(api),
        })
    }

    /// Load `image` into the engine and run `read` against it.
    fn with_image<T>(
        &self,
        image: &DynamicImage,
        read: impl FnOnce(&mut LepTess) -> Result<T, OcrError>,
    ) -> Result<T, OcrError> {
        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|e| OcrError::Preprocessing(e.to_string()))?;

        let mut api = self
            .api
            .lock()
            .map_err(|e| OcrError::ExtractionFailed(format!("Tesseract lock poisoned: {}", e)))?;

        api.set_image_from_mem(&encoded)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        read(&mut *api)
    }
}

impl ClassicalEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "Tesseract"
    }

    fn token_confidences(&self, image: &DynamicImage) -> Result<Vec<f64>, OcrError> {
        self.with_image(image, |api| {
            let hocr = api
                .get_hocr_text(0)
                .map_err(|e| OcrError::ExtractionFailed(e.to_string()))?;
            let confidences = word_confidences(&hocr);
            debug!("Tesseract reported {} words", confidences.len());
            Ok(confidences)
        })
    }

    fn plain_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
        self.with_image(image, |api| {
            api.get_utf8_text()
                .map_err(|e| OcrError::ExtractionFailed(e.to_string()))
        })
    }
}
