//! Image preprocessing shared by the OCR backends.

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
#[cfg(feature = "native")]
use image::GenericImageView;
#[cfg(feature = "native")]
use ndarray::Array4;

use super::Rotation;

/// Composite the image onto a white background and drop the alpha channel.
///
/// Transparent regions of PNG/WebP labels otherwise decode as black, which
/// classical engines read as ink.
pub fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba: RgbaImage = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    out
}

/// Rotate counter-clockwise by `rotation`, on a white background.
///
/// Right-angle rotations swap the canvas dimensions, so no content is
/// cropped and no background is exposed beyond what the alpha channel
/// already leaves transparent.
pub fn rotate(image: &DynamicImage, rotation: Rotation) -> DynamicImage {
    let flat = DynamicImage::ImageRgb8(flatten_to_rgb(image));
    match rotation {
        Rotation::Deg0 => flat,
        // `image` rotates clockwise; 90° counter-clockwise is 270° clockwise.
        Rotation::Deg90 => flat.rotate270(),
        Rotation::Deg180 => flat.rotate180(),
        Rotation::Deg270 => flat.rotate90(),
    }
}

/// Scale (width, height) so the longer side is at most `limit`, keeping the
/// aspect ratio. Images already within the limit are left alone.
#[cfg(feature = "native")]
pub(crate) fn fit_within(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= limit {
        return (width, height);
    }

    let scale = limit as f32 / longest as f32;
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Per-channel normalization `(x / 255 - mean) / std`.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

#[cfg(feature = "native")]
impl Normalization {
    /// ImageNet statistics used by the DB detector.
    pub const IMAGENET: Normalization = Normalization {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Symmetric [-1, 1] scaling used by recognition and classification.
    pub const SYMMETRIC: Normalization = Normalization {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };
}

/// Resize to exactly `width` x `height` and write it into the top-left of a
/// zero-padded NCHW tensor of `canvas` (width, height).
#[cfg(feature = "native")]
pub(crate) fn to_nchw(
    image: &DynamicImage,
    width: u32,
    height: u32,
    canvas: (u32, u32),
    norm: Normalization,
) -> Array4<f32> {
    let resized = image
        .resize_exact(width, height, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let (canvas_w, canvas_h) = canvas;
    let mut tensor = Array4::<f32>::zeros((1, 3, canvas_h as usize, canvas_w as usize));

    for (x, y, pixel) in resized.enumerate_pixels() {
        if x >= canvas_w || y >= canvas_h {
            continue;
        }
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - norm.mean[c]) / norm.std[c];
        }
    }

    tensor
}

/// Crop the axis-aligned rectangle around a quadrilateral, clamped to the
/// image.
#[cfg(feature = "native")]
pub(crate) fn crop_quad(image: &DynamicImage, quad: &[f32; 8]) -> DynamicImage {
    let xs = [quad[0], quad[2], quad[4], quad[6]];
    let ys = [quad[1], quad[3], quad[5], quad[7]];
    let (w, h) = image.dimensions();

    let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min).max(0.0) as u32;
    let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min).max(0.0) as u32;
    let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max).min(w as f32) as u32;
    let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max).min(h as f32) as u32;

    image.crop_imm(
        min_x,
        min_y,
        max_x.saturating_sub(min_x).max(1),
        max_y.saturating_sub(min_y).max(1),
    )
}
