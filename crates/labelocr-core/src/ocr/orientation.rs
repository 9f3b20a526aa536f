//! Four-way orientation search over a classical OCR engine.
//!
//! Classical engines read badly off-axis, so the image is recognized at each
//! right-angle rotation and the most trustworthy reading wins. A candidate's
//! score is `avg_confidence * (1 + text_length / length_divisor)`, which lets
//! a rotation with slightly lower confidence but much more text win.

use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::OcrError;

use super::preprocessing::rotate;
use super::{OcrBackend, OcrResult, Rotation};

/// A classical engine with separate detailed and plain-text modes.
pub trait ClassicalEngine: Send + Sync {
    /// Static identifier reported by the health probe.
    fn name(&self) -> &'static str;

    /// Detailed mode: one confidence per recognized token, in `[0, 100]`, or a
    /// non-positive sentinel for "no recognition".
    fn token_confidences(&self, image: &DynamicImage) -> Result<Vec<f64>, OcrError>;

    /// Plain-text mode: the full recognized text.
    fn plain_text(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Measurements for one qualified rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub rotation: Rotation,
    pub avg_confidence: f64,
    pub text_length: usize,
    pub score: f64,
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Winning rotation, or 0° when the unrotated fallback was used.
    pub rotation: Rotation,
    /// Trimmed text of the winner (or of the fallback).
    pub text: String,
    /// Score of the winner; `None` when no candidate won.
    pub score: Option<f64>,
    /// Every candidate that produced at least one confident token.
    pub candidates: Vec<CandidateScore>,
}

/// Orientation search wrapping a classical engine.
pub struct OrientationSearch<E> {
    engine: E,
    length_divisor: f64,
}

impl<E: ClassicalEngine> OrientationSearch<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            length_divisor: 1000.0,
        }
    }

    /// Override the text-length divisor in the score.
    pub fn with_length_divisor(mut self, divisor: f64) -> Self {
        if divisor > 0.0 {
            self.length_divisor = divisor;
        }
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Try every rotation in [`Rotation::ALL`] order and keep the best.
    ///
    /// A candidate replaces the incumbent only if it has text and a strictly
    /// greater score, so ties go to the earlier rotation. Engine errors
    /// disqualify only the rotation they happened on. If nothing wins, the
    /// unrotated image is read in plain-text mode; an error there is the only
    /// one that propagates.
    pub fn search(&self, image: &DynamicImage) -> Result<SearchOutcome, OcrError> {
        let mut best: Option<(CandidateScore, String)> = None;
        let mut candidates = Vec::with_capacity(Rotation::ALL.len());

        for rotation in Rotation::ALL {
            let rotated = rotate(image, rotation);

            let (candidate, text) = match self.evaluate(rotation, &rotated) {
                Ok(Some(evaluated)) => evaluated,
                Ok(None) => {
                    debug!("Rotation {}: no confident tokens, skipped", rotation);
                    continue;
                }
                Err(e) => {
                    warn!("Rotation {} failed: {}", rotation, e);
                    continue;
                }
            };

            debug!(
                "Rotation {}: confidence={:.2}, text_length={}, score={:.2}",
                rotation, candidate.avg_confidence, candidate.text_length, candidate.score
            );

            let improves = match &best {
                Some((incumbent, _)) => candidate.score > incumbent.score,
                None => true,
            };
            if candidate.text_length > 0 && improves {
                best = Some((candidate.clone(), text));
            }
            candidates.push(candidate);
        }

        match best {
            Some((winner, text)) => {
                info!(
                    "Best orientation: {} (score: {:.2})",
                    winner.rotation, winner.score
                );
                Ok(SearchOutcome {
                    rotation: winner.rotation,
                    text,
                    score: Some(winner.score),
                    candidates,
                })
            }
            None => {
                warn!("No text detected in any orientation, reading original image");
                let text = self
                    .engine
                    .plain_text(&rotate(image, Rotation::Deg0))
                    .map_err(|e| OcrError::ExtractionFailed(e.to_string()))?;
                Ok(SearchOutcome {
                    rotation: Rotation::Deg0,
                    text: text.trim().to_string(),
                    score: None,
                    candidates,
                })
            }
        }
    }

    /// Score one rotated image. `Ok(None)` means disqualified.
    fn evaluate(
        &self,
        rotation: Rotation,
        rotated: &DynamicImage,
    ) -> Result<Option<(CandidateScore, String)>, OcrError> {
        let confident: Vec<f64> = self
            .engine
            .token_confidences(rotated)?
            .into_iter()
            .filter(|c| *c > 0.0)
            .collect();

        if confident.is_empty() {
            return Ok(None);
        }

        let avg_confidence = confident.iter().sum::<f64>() / confident.len() as f64;

        let text = self.engine.plain_text(rotated)?.trim().to_string();
        let text_length = text.chars().filter(|c| !c.is_whitespace()).count();

        let score = avg_confidence * (1.0 + text_length as f64 / self.length_divisor);

        Ok(Some((
            CandidateScore {
                rotation,
                avg_confidence,
                text_length,
                score,
            },
            text,
        )))
    }
}

impl<E: ClassicalEngine> OcrBackend for OrientationSearch<E> {
    fn name(&self) -> &'static str {
        self.engine.name()
    }

    fn extract(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let outcome = self.search(image)?;

        Ok(OcrResult {
            text: outcome.text,
            orientation: outcome.rotation,
            score: outcome.score,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
