//! Text line detection with a DB (differentiable binarization) model.

use std::collections::VecDeque;

use image::{DynamicImage, GenericImageView};
use ndarray::{ArrayView2, Ix4, s};
use tracing::debug;

use crate::error::OcrError;
use labelocr_inference::{InferenceBackend, InputTensor};

use super::preprocessing::{Normalization, fit_within, to_nchw};

/// Components smaller than this many pixels are treated as noise.
const MIN_REGION_PIXELS: usize = 10;

/// A detected line: quadrilateral in source image coordinates plus the mean
/// probability inside its region.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub quad: [f32; 8],
    pub score: f32,
}

/// Connected region of the binarized probability map.
#[derive(Debug, Clone, PartialEq)]
struct Region {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
    pixels: usize,
    prob_sum: f32,
}

impl Region {
    fn mean_prob(&self) -> f32 {
        self.prob_sum / self.pixels as f32
    }
}

/// Text detector over a DB probability-map model.
pub struct TextDetector<B: InferenceBackend> {
    backend: B,
    threshold: f32,
    box_threshold: f32,
    unclip_ratio: f32,
    limit_side: u32,
}

impl<B: InferenceBackend> TextDetector<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            limit_side: 960,
        }
    }

    /// Probability above which a map pixel counts as text.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Minimum mean probability for a region to be reported.
    pub fn with_box_threshold(mut self, threshold: f32) -> Self {
        self.box_threshold = threshold;
        self
    }

    /// Detect text lines, in no particular order.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, OcrError> {
        let (width, height) = image.dimensions();
        let (resized_w, resized_h) = fit_within(width, height, self.limit_side);

        // DB models need both sides divisible by 32.
        let canvas = (resized_w.div_ceil(32) * 32, resized_h.div_ceil(32) * 32);
        let tensor = to_nchw(image, resized_w, resized_h, canvas, Normalization::IMAGENET);

        let output = self
            .backend
            .run_single(InputTensor::Float32(tensor.into_dyn()))?
            .into_f32()?;

        let shape = output.shape().to_vec();
        let output = output.into_dimensionality::<Ix4>().map_err(|_| {
            OcrError::ExtractionFailed(format!(
                "detector output shape {:?}, expected [1, 1, H, W]",
                shape
            ))
        })?;
        debug!("Detection map shape: {:?}", shape);

        let prob_map = output.slice(s![0, 0, .., ..]);
        let scale_x = width as f32 / resized_w as f32;
        let scale_y = height as f32 / resized_h as f32;

        let detections: Vec<Detection> = label_regions(prob_map, self.threshold)
            .into_iter()
            .filter(|r| r.pixels >= MIN_REGION_PIXELS && r.mean_prob() >= self.box_threshold)
            .map(|r| self.to_detection(&r, scale_x, scale_y, (width, height)))
            .collect();

        debug!("Detected {} text regions", detections.len());
        Ok(detections)
    }

    /// Expand a region by the unclip ratio and map it back to the source
    /// image, clamped to its bounds.
    fn to_detection(&self, region: &Region, scale_x: f32, scale_y: f32, bounds: (u32, u32)) -> Detection {
        let w = (region.max_x - region.min_x) as f32;
        let h = (region.max_y - region.min_y) as f32;
        let pad_x = w * (self.unclip_ratio - 1.0) / 2.0;
        let pad_y = h * (self.unclip_ratio - 1.0) / 2.0;

        let (max_w, max_h) = (bounds.0 as f32, bounds.1 as f32);
        let x1 = ((region.min_x as f32 - pad_x) * scale_x).clamp(0.0, max_w);
        let y1 = ((region.min_y as f32 - pad_y) * scale_y).clamp(0.0, max_h);
        let x2 = ((region.max_x as f32 + 1.0 + pad_x) * scale_x).clamp(0.0, max_w);
        let y2 = ((region.max_y as f32 + 1.0 + pad_y) * scale_y).clamp(0.0, max_h);

        Detection {
            quad: [x1, y1, x2, y1, x2, y2, x1, y2],
            score: region.mean_prob(),
        }
    }
}

/// 4-connected components of pixels whose probability exceeds `threshold`.
fn label_regions(prob: ArrayView2<'_, f32>, threshold: f32) -> Vec<Region> {
    let (rows, cols) = prob.dim();
    let mut seen = vec![false; rows * cols];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..rows {
        for x in 0..cols {
            if seen[y * cols + x] || prob[[y, x]] <= threshold {
                continue;
            }

            let mut region = Region {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixels: 0,
                prob_sum: 0.0,
            };
            seen[y * cols + x] = true;
            queue.push_back((y, x));

            while let Some((cy, cx)) = queue.pop_front() {
                region.min_x = region.min_x.min(cx);
                region.max_x = region.max_x.max(cx);
                region.min_y = region.min_y.min(cy);
                region.max_y = region.max_y.max(cy);
                region.pixels += 1;
                region.prob_sum += prob[[cy, cx]];

                let neighbours = [
                    (cy.wrapping_sub(1), cx),
                    (cy + 1, cx),
                    (cy, cx.wrapping_sub(1)),
                    (cy, cx + 1),
                ];
                for (ny, nx) in neighbours {
                    if ny < rows && nx < cols && !seen[ny * cols + nx] && prob[[ny, nx]] > threshold {
                        seen[ny * cols + nx] = true;
                        queue.push_back((ny, nx));
                    }
                }
            }

            regions.push(region);
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelocr_inference::OutputTensor;
    use ndarray::{Array2, ArrayD, IxDyn};
    use pretty_assertions::assert_eq;

    /// Returns a fixed probability map whatever the input.
    struct FixedMap(ArrayD<f32>);

    impl InferenceBackend for FixedMap {
        fn run(
            &self,
            _inputs: &[(&str, InputTensor)],
        ) -> labelocr_inference::Result<Vec<(String, OutputTensor)>> {
            Ok(vec![("sigmoid_0.tmp_0".to_string(), OutputTensor::Float32(self.0.clone()))])
        }

        fn input_names(&self) -> &[String] {
            &[]
        }
    }

    #[test]
    fn test_label_regions_separates_components() {
        let mut map = Array2::<f32>::zeros((6, 8));
        for x in 1..4 {
            map[[1, x]] = 0.9;
        }
        map[[4, 6]] = 0.8;
        map[[4, 7]] = 0.2;

        let regions = label_regions(map.view(), 0.3);

        assert_eq!(regions.len(), 2);
        assert_eq!((regions[0].min_x, regions[0].max_x, regions[0].pixels), (1, 3, 3));
        assert_eq!((regions[1].min_x, regions[1].min_y, regions[1].pixels), (6, 4, 1));
    }

    #[test]
    fn test_detect_maps_back_to_source_coordinates() {
        // One 10x4 text band on a 64x64 map; the source is already within
        // the side limit so map and image coordinates coincide.
        let mut map = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 64, 64]));
        for y in 10..14 {
            for x in 5..15 {
                map[[0, 0, y, x]] = 0.95;
            }
        }
        // A weak blob below the box threshold.
        for y in 30..34 {
            for x in 5..15 {
                map[[0, 0, y, x]] = 0.4;
            }
        }

        let detector = TextDetector::new(FixedMap(map)).with_box_threshold(0.6);
        let image = DynamicImage::new_rgb8(64, 64);

        let detections = detector.detect(&image).unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert!((det.score - 0.95).abs() < 1e-6);
        // width 9 -> pad 2.25, height 3 -> pad 0.75
        assert_eq!(det.quad[0], 2.75);
        assert_eq!(det.quad[1], 9.25);
        assert_eq!(det.quad[4], 17.25);
        assert_eq!(det.quad[5], 14.75);
    }

    #[test]
    fn test_detect_rejects_bad_shape() {
        let detector = TextDetector::new(FixedMap(ArrayD::zeros(IxDyn(&[1, 64]))));
        let result = detector.detect(&DynamicImage::new_rgb8(32, 32));
        assert!(matches!(result, Err(OcrError::ExtractionFailed(_))));
    }
}
