//! Tensor preparation for ONNX models
//!
//! Handles resizing, normalization, and NCHW conversion for the plate locator
//! and the text recognizer.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::Array4;

/// Per-channel normalization applied after scaling pixels to 0-1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorNormalization {
    /// Mean values [R, G, B]
    pub mean: [f32; 3],
    /// Std values [R, G, B]
    pub std: [f32; 3],
}

impl TensorNormalization {
    /// Plain 0-1 scaling (locator input)
    pub const UNIT: Self = Self {
        mean: [0.0; 3],
        std: [1.0; 3],
    };

    /// Maps [0, 255] to [-1, 1] (recognizer input)
    pub const SYMMETRIC: Self = Self {
        mean: [0.5; 3],
        std: [0.5; 3],
    };

    fn apply(&self, value: u8, channel: usize) -> f32 {
        (value as f32 / 255.0 - self.mean[channel]) / self.std[channel]
    }
}

/// Convert an RGB image to an NCHW tensor (batch size 1)
pub fn rgb_to_nchw(image: &RgbImage, norm: &TensorNormalization) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = norm.apply(pixel[c], c);
        }
    }

    tensor
}

/// Convert a grayscale image to an NCHW tensor, replicating the gray
/// channel when the model expects more than one
pub fn gray_to_nchw(image: &GrayImage, channels: usize, norm: &TensorNormalization) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let channels = channels.clamp(1, 3);
    let mut tensor = Array4::<f32>::zeros((1, channels, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..channels {
            tensor[[0, c, y as usize, x as usize]] = norm.apply(pixel[0], c);
        }
    }

    tensor
}

/// Resize to a fixed square input for the plate locator
pub fn prepare_locator_input(image: &RgbImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    rgb_to_nchw(&resized, &TensorNormalization::UNIT)
}

/// Fit a text crop into the recognizer's fixed input.
///
/// The crop is scaled to `target_height` keeping its aspect ratio, capped at
/// `target_width`, and right-padded with white so dark text on a light plate
/// stays unambiguous.
pub fn prepare_recognizer_input(
    image: &GrayImage,
    target_width: u32,
    target_height: u32,
    channels: usize,
) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let target_width = target_width.max(1);
    let target_height = target_height.max(1);

    let scaled_width = if height == 0 {
        target_width
    } else {
        let w = (width as f32 * target_height as f32 / height as f32).round() as u32;
        w.clamp(1, target_width)
    };

    let resized = imageops::resize(image, scaled_width, target_height, FilterType::Triangle);
    let mut canvas = GrayImage::from_pixel(target_width, target_height, image::Luma([255]));
    imageops::replace(&mut canvas, &resized, 0, 0);

    gray_to_nchw(&canvas, channels, &TensorNormalization::SYMMETRIC)
}
