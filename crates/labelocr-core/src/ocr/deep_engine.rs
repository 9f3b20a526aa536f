//! Detection + recognition OCR over ONNX Runtime.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::{LabelConfig, OcrConfig};
use labelocr_inference::{InferenceBackend, OrtBackend};

use super::classifier::LineDirectionClassifier;
use super::detector::TextDetector;
use super::preprocessing::{crop_quad, fit_within, flatten_to_rgb};
use super::recognizer::{TextRecognizer, default_english_dictionary, load_dictionary};
use super::{OcrBackend, OcrResult, TextBox, join_in_reading_order};

/// Two-stage OCR: a DB detector finds lines, an optional direction
/// classifier turns them upright and a CTC recognizer reads them.
pub struct DeepOcrEngine<B: InferenceBackend> {
    detector: TextDetector<B>,
    classifier: Option<LineDirectionClassifier<B>>,
    recognizer: TextRecognizer<B>,
    config: OcrConfig,
}

/// Builder for [`DeepOcrEngine`].
pub struct DeepOcrEngineBuilder<B: InferenceBackend> {
    detector: Option<TextDetector<B>>,
    classifier: Option<LineDirectionClassifier<B>>,
    recognizer: Option<TextRecognizer<B>>,
    config: OcrConfig,
}

impl<B: InferenceBackend> DeepOcrEngineBuilder<B> {
    pub fn new() -> Self {
        Self {
            detector: None,
            classifier: None,
            recognizer: None,
            config: OcrConfig::default(),
        }
    }

    pub fn with_detector(mut self, detector: TextDetector<B>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_classifier(mut self, classifier: LineDirectionClassifier<B>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_recognizer(mut self, recognizer: TextRecognizer<B>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_config(mut self, config: OcrConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails when the detector or recognizer is missing.
    pub fn build(self) -> Result<DeepOcrEngine<B>, OcrError> {
        let detector = self
            .detector
            .ok_or_else(|| OcrError::BackendUnavailable("no text detector configured".into()))?;
        let recognizer = self
            .recognizer
            .ok_or_else(|| OcrError::BackendUnavailable("no text recognizer configured".into()))?;

        let classifier = if self.config.enable_classification {
            self.classifier
        } else {
            None
        };

        Ok(DeepOcrEngine {
            detector,
            classifier,
            recognizer,
            config: self.config,
        })
    }
}

impl<B: InferenceBackend> Default for DeepOcrEngineBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: InferenceBackend> DeepOcrEngine<B> {
    pub fn builder() -> DeepOcrEngineBuilder<B> {
        DeepOcrEngineBuilder::new()
    }

    /// Recognize every detected line, dropping those under the recognition
    /// threshold.
    pub fn text_boxes(&self, image: &DynamicImage) -> Result<Vec<TextBox>, OcrError> {
        let detections = self.detector.detect(image)?;
        let mut boxes = Vec::with_capacity(detections.len());

        for detection in detections {
            let mut line = crop_quad(image, &detection.quad);
            if let Some(classifier) = &self.classifier {
                line = classifier.orient(line)?;
            }

            let recognition = self.recognizer.recognize(&line)?;
            if recognition.text.trim().is_empty()
                || recognition.confidence < self.config.recognition_threshold
            {
                continue;
            }

            boxes.push(TextBox {
                bbox: detection.quad,
                text: recognition.text,
                detection_score: detection.score,
                recognition_score: recognition.confidence,
            });
        }

        Ok(boxes)
    }
}

impl DeepOcrEngine<OrtBackend> {
    /// Load detector, classifier and recognizer models from
    /// `config.models.model_dir`.
    ///
    /// The classifier is optional; a missing dictionary falls back to the
    /// built-in English one.
    pub fn from_config(config: &LabelConfig) -> Result<Self, OcrError> {
        let threads = config.ocr.num_threads;
        let det_path = config.model_path(&config.models.detection_model);
        let cls_path = config.model_path(&config.models.classification_model);
        let rec_path = config.model_path(&config.models.recognition_model);
        let dict_path = config.model_path(&config.models.dictionary);

        let detector = TextDetector::new(load_model(&det_path, threads)?)
            .with_threshold(config.ocr.detection_threshold)
            .with_box_threshold(config.ocr.box_threshold);

        let dictionary = if dict_path.exists() {
            load_dictionary(&dict_path)?
        } else {
            debug!("No dictionary at {}, using built-in", dict_path.display());
            default_english_dictionary()
        };
        let recognizer = TextRecognizer::new(load_model(&rec_path, threads)?, dictionary);

        let mut builder = DeepOcrEngine::builder()
            .with_detector(detector)
            .with_recognizer(recognizer)
            .with_config(config.ocr.clone());

        if config.ocr.enable_classification && cls_path.exists() {
            builder = builder.with_classifier(LineDirectionClassifier::new(load_model(
                &cls_path, threads,
            )?));
        }

        info!(
            "Loaded PaddleOCR models from {}",
            config.models.model_dir.display()
        );
        builder.build()
    }
}

fn load_model(path: &Path, threads: usize) -> Result<OrtBackend, OcrError> {
    Ok(OrtBackend::from_file(path, threads)?)
}

impl<B: InferenceBackend> OcrBackend for DeepOcrEngine<B> {
    fn name(&self) -> &'static str {
        "PaddleOCR (ort)"
    }

    fn extract(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();

        let (w, h) = image.dimensions();
        let (fit_w, fit_h) = fit_within(w, h, self.config.max_image_size);
        let mut prepared = DynamicImage::ImageRgb8(flatten_to_rgb(image));
        if (fit_w, fit_h) != (w, h) {
            prepared = prepared.resize_exact(fit_w, fit_h, image::imageops::FilterType::Triangle);
        }

        info!("Processing image: {}x{}", fit_w, fit_h);

        let mut boxes = self.text_boxes(&prepared)?;
        let text = join_in_reading_order(&mut boxes);
        let elapsed = start.elapsed().as_millis() as u64;

        info!("OCR complete: {} lines in {}ms", boxes.len(), elapsed);
        Ok(OcrResult::upright(text, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelocr_inference::{InputTensor, OutputTensor};
    use ndarray::{ArrayD, IxDyn};
    use pretty_assertions::assert_eq;

    /// Serves the detector a map with two lines and the recognizer a fixed
    /// CTC sequence, keyed on input width.
    struct Scripted;

    impl InferenceBackend for Scripted {
        fn run(
            &self,
            inputs: &[(&str, InputTensor)],
        ) -> labelocr_inference::Result<Vec<(String, OutputTensor)>> {
            let height = inputs[0].1.shape()[2];
            if height == 48 {
                // "ok" over classes [blank, 'k', 'o']
                let seq = ArrayD::from_shape_vec(
                    IxDyn(&[1, 3, 3]),
                    vec![0.0, 0.0, 0.9, 1.0, 0.0, 0.0, 0.0, 0.8, 0.0],
                )
                .unwrap();
                return Ok(vec![("rec".into(), OutputTensor::Float32(seq))]);
            }

            let mut map = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 64, 64]));
            for (top, left) in [(40, 4), (4, 30)] {
                for y in top..top + 4 {
                    for x in left..left + 10 {
                        map[[0, 0, y, x]] = 0.9;
                    }
                }
            }
            Ok(vec![("det".into(), OutputTensor::Float32(map))])
        }

        fn input_names(&self) -> &[String] {
            &[]
        }
    }

    #[test]
    fn test_extract_reads_lines_in_order() {
        let engine = DeepOcrEngine::builder()
            .with_detector(TextDetector::new(Scripted))
            .with_recognizer(TextRecognizer::new(Scripted, vec!['\0', 'k', 'o']))
            .build()
            .unwrap();

        let result = engine.extract(&DynamicImage::new_rgb8(64, 64)).unwrap();

        assert_eq!(result.text, "ok\nok");
        assert_eq!(result.score, None);
        assert_eq!(engine.name(), "PaddleOCR (ort)");
    }

    #[test]
    fn test_build_requires_recognizer() {
        let result = DeepOcrEngine::builder()
            .with_detector(TextDetector::new(Scripted))
            .build();
        assert!(matches!(result, Err(OcrError::BackendUnavailable(_))));
    }

    #[test]
    fn test_from_config_without_models() {
        let mut config = LabelConfig::default();
        config.models.model_dir = "/nonexistent/labelocr-models".into();

        let result = DeepOcrEngine::from_config(&config);
        assert!(matches!(result, Err(OcrError::BackendUnavailable(_))));
    }
}
