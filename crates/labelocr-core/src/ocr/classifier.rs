//! Upright vs upside-down classification of cropped text lines.

use image::DynamicImage;
use tracing::trace;

use crate::error::OcrError;
use labelocr_inference::{InferenceBackend, InputTensor};

use super::preprocessing::{Normalization, to_nchw};

const INPUT_WIDTH: u32 = 192;
const INPUT_HEIGHT: u32 = 48;

/// Two-class (0°/180°) line classifier.
///
/// Only lines judged upside down with confidence above the threshold are
/// flipped; coarse page orientation is not this model's job.
pub struct LineDirectionClassifier<B: InferenceBackend> {
    backend: B,
    threshold: f32,
}

impl<B: InferenceBackend> LineDirectionClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            threshold: 0.9,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Probability that the line is upside down.
    pub fn flipped_probability(&self, line: &DynamicImage) -> Result<f32, OcrError> {
        let tensor = to_nchw(
            line,
            INPUT_WIDTH,
            INPUT_HEIGHT,
            (INPUT_WIDTH, INPUT_HEIGHT),
            Normalization::SYMMETRIC,
        );

        let output = self
            .backend
            .run_single(InputTensor::Float32(tensor.into_dyn()))?
            .into_f32()?;

        match output.iter().copied().collect::<Vec<f32>>().as_slice() {
            [upright, flipped, ..] => {
                trace!("Line direction: 0° {:.3}, 180° {:.3}", upright, flipped);
                Ok(if flipped > upright { *flipped } else { 0.0 })
            }
            other => Err(OcrError::ExtractionFailed(format!(
                "classifier returned {} values, expected 2",
                other.len()
            ))),
        }
    }

    /// Return the line turned upright.
    pub fn orient(&self, line: DynamicImage) -> Result<DynamicImage, OcrError> {
        if self.flipped_probability(&line)? > self.threshold {
            Ok(line.rotate180())
        } else {
            Ok(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use labelocr_inference::OutputTensor;
    use ndarray::{ArrayD, IxDyn};
    use pretty_assertions::assert_eq;

    struct FixedScores(Vec<f32>);

    impl InferenceBackend for FixedScores {
        fn run(
            &self,
            _inputs: &[(&str, InputTensor)],
        ) -> labelocr_inference::Result<Vec<(String, OutputTensor)>> {
            let scores = ArrayD::from_shape_vec(IxDyn(&[1, self.0.len()]), self.0.clone()).unwrap();
            Ok(vec![("softmax_0.tmp_0".to_string(), OutputTensor::Float32(scores))])
        }

        fn input_names(&self) -> &[String] {
            &[]
        }
    }

    fn marked_line() -> DynamicImage {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_confident_flip_rotates() {
        let classifier = LineDirectionClassifier::new(FixedScores(vec![0.02, 0.98]));
        let out = classifier.orient(marked_line()).unwrap().to_rgb8();
        assert_eq!(out.get_pixel(3, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_unsure_flip_keeps_line() {
        let classifier = LineDirectionClassifier::new(FixedScores(vec![0.3, 0.7]));
        let out = classifier.orient(marked_line()).unwrap().to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_malformed_output() {
        let classifier = LineDirectionClassifier::new(FixedScores(vec![1.0]));
        assert!(classifier.flipped_probability(&marked_line()).is_err());
    }
}
