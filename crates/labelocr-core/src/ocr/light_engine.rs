//! Lightweight reader on `pure-onnx-ocr` (no native ONNX Runtime).

use std::sync::Mutex;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::LabelConfig;

use super::preprocessing::flatten_to_rgb;
use super::{OcrBackend, OcrResult, TextBox, join_in_reading_order};

pub struct LightOcrEngine {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
}

impl LightOcrEngine {
    /// Load the detection model, recognition model and dictionary from
    /// `config.models.model_dir`. All three files are required.
    pub fn from_config(config: &LabelConfig) -> Result<Self, OcrError> {
        let det_path = config.model_path(&config.models.detection_model);
        let rec_path = config.model_path(&config.models.recognition_model);
        let dict_path = config.model_path(&config.models.dictionary);

        if let Some(missing) = [&det_path, &rec_path, &dict_path].into_iter().find(|p| !p.exists()) {
            return Err(OcrError::BackendUnavailable(format!(
                "model file not found: {}",
                missing.display()
            )));
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::BackendUnavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!(
            "Loaded pure-onnx-ocr engine from {}",
            config.models.model_dir.display()
        );

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: config.ocr.keep_unk,
        })
    }
}

impl OcrBackend for LightOcrEngine {
    fn name(&self) -> &'static str {
        "pure-onnx-ocr"
    }

    fn extract(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let prepared = DynamicImage::ImageRgb8(flatten_to_rgb(image));

        let results = {
            let engine = self
                .engine
                .lock()
                .map_err(|e| OcrError::ExtractionFailed(format!("engine lock poisoned: {}", e)))?;
            engine
                .run_from_image(&prepared)
                .map_err(|e| OcrError::ExtractionFailed(format!("pure-onnx-ocr: {}", e)))?
        };

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut boxes: Vec<TextBox> = results
            .iter()
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: clean_text(&r.text, self.keep_unk),
                detection_score: r.confidence,
                recognition_score: r.confidence,
            })
            .filter(|b| !b.text.trim().is_empty())
            .collect();

        let text = join_in_reading_order(&mut boxes);
        let elapsed = start.elapsed().as_millis() as u64;

        info!("OCR complete: {} lines in {}ms", boxes.len(), elapsed);
        Ok(OcrResult::upright(text, elapsed))
    }
}

/// Replace `[UNK]` markers with spaces unless asked to keep them.
fn clean_text(text: &str, keep_unk: bool) -> String {
    if keep_unk {
        text.to_string()
    } else {
        text.replace("[UNK]", " ").trim().to_string()
    }
}

/// First four exterior points of the polygon as `[x1, y1, ..., x4, y4]`.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
