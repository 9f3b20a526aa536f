//! Line recognition with a CTC model.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use ndarray::{ArrayView2, Ix3, s};
use tracing::{debug, trace};

use crate::error::OcrError;
use labelocr_inference::{InferenceBackend, InputTensor};

use super::preprocessing::{Normalization, to_nchw};

const INPUT_HEIGHT: u32 = 48;
const MAX_INPUT_WIDTH: u32 = 320;

/// Text and mean per-character probability for one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

/// Load a character dictionary with one symbol per line.
///
/// Index 0 is reserved for the CTC blank and a trailing space symbol is
/// appended, matching the layout of PaddleOCR recognition heads.
pub fn load_dictionary(path: &Path) -> Result<Vec<char>, OcrError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OcrError::BackendUnavailable(format!("failed to read dictionary {}: {}", path.display(), e))
    })?;

    let mut chars = vec!['\0'];
    chars.extend(content.lines().filter_map(|line| line.chars().next()));
    chars.push(' ');

    debug!("Loaded dictionary with {} symbols", chars.len());
    Ok(chars)
}

/// Printable ASCII in PaddleOCR's English dictionary order.
pub fn default_english_dictionary() -> Vec<char> {
    let mut chars = vec!['\0'];
    chars.extend('0'..='9');
    chars.extend(":;<=>?@".chars());
    chars.extend('A'..='Z');
    chars.extend("[\\]^_`".chars());
    chars.extend('a'..='z');
    chars.extend("{|}~!\"#$%&'()*+,-./".chars());
    chars.push(' ');
    chars
}

/// Recognizer for single cropped text lines.
pub struct TextRecognizer<B: InferenceBackend> {
    backend: B,
    dictionary: Vec<char>,
}

impl<B: InferenceBackend> TextRecognizer<B> {
    pub fn new(backend: B, dictionary: Vec<char>) -> Self {
        Self {
            backend,
            dictionary,
        }
    }

    pub fn recognize(&self, line: &DynamicImage) -> Result<Recognition, OcrError> {
        let (w, h) = line.dimensions();
        let ratio = w as f32 / h.max(1) as f32;
        let width = ((INPUT_HEIGHT as f32 * ratio).ceil() as u32).clamp(1, MAX_INPUT_WIDTH);

        let tensor = to_nchw(
            line,
            width,
            INPUT_HEIGHT,
            (MAX_INPUT_WIDTH, INPUT_HEIGHT),
            Normalization::SYMMETRIC,
        );

        let output = self
            .backend
            .run_single(InputTensor::Float32(tensor.into_dyn()))?
            .into_f32()?;

        let shape = output.shape().to_vec();
        let output = output.into_dimensionality::<Ix3>().map_err(|_| {
            OcrError::ExtractionFailed(format!(
                "recognizer output shape {:?}, expected [1, T, C]",
                shape
            ))
        })?;

        let recognition = ctc_greedy_decode(output.slice(s![0, .., ..]), &self.dictionary);
        trace!(
            "Recognized '{}' ({:.3})",
            recognition.text, recognition.confidence
        );
        Ok(recognition)
    }
}

/// Best-path decoding over per-step class probabilities `[T, C]`.
///
/// Repeated classes collapse into one symbol and the blank (index 0)
/// separates genuine repeats.
fn ctc_greedy_decode(probs: ArrayView2<'_, f32>, dictionary: &[char]) -> Recognition {
    let mut text = String::new();
    let mut scores = Vec::new();
    let mut prev = 0usize;

    for step in probs.rows() {
        let (best, prob) = step
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        if best != 0 && best != prev {
            if let Some(&c) = dictionary.get(best) {
                text.push(c);
                scores.push(prob);
            }
        }
        prev = best;
    }

    let confidence = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    };

    Recognition { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use pretty_assertions::assert_eq;

    fn one_hot(steps: &[(usize, f32)], classes: usize) -> Array2<f32> {
        let mut probs = Array2::zeros((steps.len(), classes));
        for (t, &(class, p)) in steps.iter().enumerate() {
            probs[[t, class]] = p;
        }
        probs
    }

    #[test]
    fn test_default_dictionary_layout() {
        let dict = default_english_dictionary();
        assert_eq!(dict[0], '\0');
        assert_eq!(dict[1], '0');
        assert_eq!(dict.last(), Some(&' '));
        assert!(dict.contains(&'A'));
        assert!(dict.contains(&'z'));
        assert!(dict.contains(&'-'));
    }

    #[test]
    fn test_ctc_collapses_repeats_and_blanks() {
        let dict = vec!['\0', 'a', 'l', 'm', 'u'];
        // a a _ m u l l  ->  "amul"
        let probs = one_hot(
            &[(1, 0.9), (1, 0.8), (0, 0.9), (3, 0.7), (4, 1.0), (2, 0.6), (2, 0.9)],
            5,
        );

        let rec = ctc_greedy_decode(probs.view(), &dict);
        assert_eq!(rec.text, "amul");
        assert!((rec.confidence - (0.9 + 0.7 + 1.0 + 0.6) / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_ctc_blank_separates_double_letters() {
        let dict = vec!['\0', 'a', 'z'];
        let probs = one_hot(&[(1, 1.0), (2, 1.0), (0, 1.0), (2, 1.0), (1, 1.0)], 3);
        assert_eq!(ctc_greedy_decode(probs.view(), &dict).text, "azza");
    }

    #[test]
    fn test_ctc_all_blank() {
        let rec = ctc_greedy_decode(one_hot(&[(0, 1.0), (0, 1.0)], 2).view(), &['\0', 'x']);
        assert_eq!(rec, Recognition { text: String::new(), confidence: 0.0 });
    }

    #[test]
    fn test_load_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "0\n1\nA\n").unwrap();

        let dict = load_dictionary(&path).unwrap();
        assert_eq!(dict, vec!['\0', '0', '1', 'A', ' ']);
    }
}
