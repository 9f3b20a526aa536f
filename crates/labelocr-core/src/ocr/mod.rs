//! OCR backends and the orientation search.
//!
//! Every backend implements [`OcrBackend`]. The pipeline holds exactly one,
//! chosen by [`BackendKind`] at startup through [`create_backend`].

mod hocr;
mod orientation;
mod preprocessing;

#[cfg(feature = "native")]
mod classifier;
#[cfg(feature = "native")]
mod deep_engine;
#[cfg(feature = "native")]
mod detector;
#[cfg(feature = "native")]
mod light_engine;
#[cfg(feature = "native")]
mod recognizer;
#[cfg(feature = "tesseract")]
mod tesseract;

pub use hocr::word_confidences;
pub use orientation::{ClassicalEngine, OrientationSearch, SearchOutcome};
pub use preprocessing::{flatten_to_rgb, rotate};

#[cfg(feature = "native")]
pub use classifier::LineDirectionClassifier;
#[cfg(feature = "native")]
pub use deep_engine::{DeepOcrEngine, DeepOcrEngineBuilder};
#[cfg(feature = "native")]
pub use detector::TextDetector;
#[cfg(feature = "native")]
pub use light_engine::LightOcrEngine;
#[cfg(feature = "native")]
pub use recognizer::TextRecognizer;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;
#[cfg(any(feature = "native", feature = "tesseract"))]
use crate::models::config::BackendKind;
use crate::models::config::LabelConfig;

/// Counter-clockwise rotation applied to an image before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Candidates in evaluation order. Earlier entries win ties.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("unsupported rotation: {}", other)),
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Text extracted from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text.
    pub text: String,

    /// Rotation under which the text was read. Always 0° for backends that
    /// do not search orientations.
    pub orientation: Rotation,

    /// Orientation search score of the winning rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Result of a backend that reads the image as-is.
    pub fn upright(text: String, processing_time_ms: u64) -> Self {
        Self {
            text,
            orientation: Rotation::Deg0,
            score: None,
            processing_time_ms,
        }
    }
}

/// An interchangeable OCR implementation.
///
/// Backends hold heavyweight model state built once per process; `extract`
/// takes `&self` so one instance serves concurrent invocations.
pub trait OcrBackend: Send + Sync {
    /// Static identifier reported by the health probe.
    fn name(&self) -> &'static str;

    /// Extract the text of an image.
    fn extract(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;
}

/// A recognized text line with its quadrilateral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Corner coordinates (x1, y1, ..., x4, y4), clockwise from top-left.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Detection confidence score (0.0 - 1.0).
    pub detection_score: f32,

    /// Recognition confidence score (0.0 - 1.0).
    pub recognition_score: f32,
}

impl TextBox {
    /// Axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min = |v: [f32; 4]| v.into_iter().fold(f32::INFINITY, f32::min);
        let max = |v: [f32; 4]| v.into_iter().fold(f32::NEG_INFINITY, f32::max);

        (min(xs), min(ys), max(xs), max(ys))
    }
}

/// Sort boxes top-to-bottom, left-to-right and join their text with newlines.
///
/// Boxes whose tops fall in the same 20px band count as one row.
pub fn join_in_reading_order(boxes: &mut [TextBox]) -> String {
    boxes.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();

        let row_a = (ay / 20.0) as i32;
        let row_b = (by / 20.0) as i32;

        row_a
            .cmp(&row_b)
            .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
    });

    boxes
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the backend selected by `config.ocr.backend`.
///
/// Fails with [`OcrError::BackendUnavailable`] when models are missing or the
/// crate was built without the backend's feature.
pub fn create_backend(config: &LabelConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match config.ocr.backend {
        #[cfg(feature = "native")]
        BackendKind::Deep => Ok(Box::new(DeepOcrEngine::from_config(config)?)),
        #[cfg(feature = "native")]
        BackendKind::Light => Ok(Box::new(LightOcrEngine::from_config(config)?)),
        #[cfg(feature = "tesseract")]
        BackendKind::Classical => {
            let engine = TesseractEngine::new(
                config.models.tessdata_dir.as_deref(),
                &config.ocr.language,
            )?;
            Ok(Box::new(
                OrientationSearch::new(engine)
                    .with_length_divisor(config.orientation.length_divisor),
            ))
        }
        #[allow(unreachable_patterns)]
        other => Err(OcrError::BackendUnavailable(format!(
            "'{}' backend not compiled in; rebuild with the matching feature",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, text: &str) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            detection_score: 0.9,
            recognition_score: 0.9,
        }
    }

    #[test]
    fn test_reading_order() {
        let mut boxes = vec![
            text_box(10.0, 45.0, "Batch No: A23M08"),
            text_box(120.0, 3.0, "Toned Milk"),
            text_box(10.0, 5.0, "Amul Taaza"),
        ];

        let text = join_in_reading_order(&mut boxes);
        assert_eq!(text, "Amul Taaza\nToned Milk\nBatch No: A23M08");
    }

    #[test]
    fn test_default_backend_is_compiled_in() {
        match create_backend(&LabelConfig::default()) {
            Ok(backend) => assert_eq!(backend.name(), BackendKind::default().model_name()),
            Err(e) => assert!(!e.to_string().contains("not compiled in"), "{}", e),
        }
    }

    #[test]
    fn test_rotation_serializes_as_degrees() {
        assert_eq!(serde_json::to_string(&Rotation::Deg270).unwrap(), "270");
        assert_eq!(serde_json::from_str::<Rotation>("90").unwrap(), Rotation::Deg90);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
        assert_eq!(Rotation::Deg180.to_string(), "180°");
    }
}
