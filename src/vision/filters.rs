//! Image filters used by region proposal and crop preprocessing
//!
//! Gaussian-weighted adaptive thresholding, CLAHE and HSV color masks, which
//! `imageproc` does not provide, plus thin wrappers over its thresholding and
//! grayscale morphology. All on 8-bit images.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_open, Mask};

/// Foreground value in binary masks
pub const FOREGROUND: u8 = 255;

/// Global Otsu binarization: pixels above the Otsu level become foreground
/// (background when `inverted`)
pub fn otsu_binarize(gray: &GrayImage, inverted: bool) -> GrayImage {
    let kind = if inverted {
        ThresholdType::BinaryInverted
    } else {
        ThresholdType::Binary
    };
    threshold(gray, otsu_level(gray), kind)
}

/// Local threshold against a Gaussian-weighted neighbourhood mean.
///
/// A pixel is foreground when it is brighter than the local mean minus
/// `offset`. The Gaussian sigma is derived from `block_size` the same way
/// OpenCV derives it for a kernel of that size.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let block_size = block_size.max(3);
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(gray, sigma);

    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y)[0] as f32;
        let local = mean.get_pixel(x, y)[0] as f32;
        Luma([if value > local - offset { FOREGROUND } else { 0 }])
    })
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles` x `tiles` grid; each tile gets its own
/// clipped equalization curve and pixels are bilinearly interpolated between
/// the curves of the four nearest tile centres.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let nx = tiles.clamp(1, width) as usize;
    let ny = tiles.clamp(1, height) as usize;
    let tile_w = width as f32 / nx as f32;
    let tile_h = height as f32 / ny as f32;

    let mut histograms = vec![[0u32; 256]; nx * ny];
    for (x, y, pixel) in gray.enumerate_pixels() {
        let tx = ((x as f32 / tile_w) as usize).min(nx - 1);
        let ty = ((y as f32 / tile_h) as usize).min(ny - 1);
        histograms[ty * nx + tx][pixel[0] as usize] += 1;
    }

    let curves: Vec<[u8; 256]> = histograms
        .iter()
        .map(|hist| clipped_equalization(hist, clip_limit))
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y)[0] as usize;
        let (x0, x1, fx) = tile_neighbours((x as f32 + 0.5) / tile_w - 0.5, nx);
        let (y0, y1, fy) = tile_neighbours((y as f32 + 0.5) / tile_h - 0.5, ny);

        let sample = |tx: usize, ty: usize| curves[ty * nx + tx][value] as f32;
        let top = sample(x0, y0) * (1.0 - fx) + sample(x1, y0) * fx;
        let bottom = sample(x0, y1) * (1.0 - fx) + sample(x1, y1) * fx;
        let mapped = top * (1.0 - fy) + bottom * fy;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

/// Equalization curve of one tile with its histogram clipped at
/// `clip_limit` times the uniform bin height
fn clipped_equalization(histogram: &[u32; 256], clip_limit: f32) -> [u8; 256] {
    let total: u32 = histogram.iter().sum();
    let mut curve = [0u8; 256];
    if total == 0 {
        for (i, slot) in curve.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return curve;
    }

    let clip = ((clip_limit * total as f32 / 256.0) as u32).max(1);
    let mut clipped = *histogram;
    let mut excess = 0u32;
    for bin in clipped.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    // Spread the clipped mass evenly, remainder to the lowest bins
    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in clipped.iter_mut().enumerate() {
        *bin += per_bin + u32::from(i < remainder);
    }

    let scale = 255.0 / total as f32;
    let mut cumulative = 0u32;
    for (slot, bin) in curve.iter_mut().zip(clipped.iter()) {
        cumulative += bin;
        *slot = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    curve
}

/// Indices of the two tile centres around grid position `g` and the weight of the second
fn tile_neighbours(g: f32, count: usize) -> (usize, usize, f32) {
    if g <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = g.floor() as usize;
    if lower >= count - 1 {
        return (count - 1, count - 1, 0.0);
    }
    (lower, lower + 1, g - lower as f32)
}

/// Rectangular `width` x `height` structuring element anchored at its centre
pub fn rect_mask(width: u32, height: u32) -> Mask {
    let (width, height) = (width.clamp(1, 511), height.clamp(1, 511));
    let footprint = GrayImage::from_pixel(width, height, Luma([FOREGROUND]));
    Mask::from_image(&footprint, (width / 2) as u8, (height / 2) as u8)
}

/// White top-hat: the image minus its opening.
///
/// Keeps bright structures narrower than the kernel, such as characters and
/// plate strips, and flattens the background.
pub fn top_hat(gray: &GrayImage, mask: &Mask) -> GrayImage {
    let opened = grayscale_open(gray, mask);
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([gray.get_pixel(x, y)[0].saturating_sub(opened.get_pixel(x, y)[0])])
    })
}

/// Convert an RGB pixel to HSV with OpenCV's 8-bit ranges:
/// hue in [0, 180), saturation and value in [0, 255]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let saturation = if max == 0 {
        0.0
    } else {
        delta * 255.0 / max as f32
    };

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut hue = if delta == 0.0 {
        0.0
    } else if max as f32 == r {
        60.0 * (g - b) / delta
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let hue = (hue / 2.0).round() as u32 % 180;
    [hue as u8, saturation.round() as u8, max]
}

/// Inclusive HSV band in OpenCV 8-bit ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Mask of pixels falling inside any of the HSV bands
pub fn hsv_mask(image: &RgbImage, ranges: &[HsvRange]) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let hsv = rgb_to_hsv(r, g, b);
        Luma([if ranges.iter().any(|range| range.contains(hsv)) {
            FOREGROUND
        } else {
            0
        }])
    })
}
