//! Frame data structures for captured gate images

use image::{Rgb, RgbImage};
use std::path::Path;
use std::time::Instant;

use crate::error::FrameError;

/// Byte order of color channels in a raw pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue (optionally followed by alpha)
    #[default]
    Rgb,
    /// Blue, green, red (optionally followed by alpha) - camera and OpenCV order
    Bgr,
}

/// A captured still image, validated and stored as 8-bit RGB
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixel data
    image: RgbImage,
    /// Timestamp when the frame was created
    pub timestamp: Instant,
}

impl Frame {
    /// Build a frame from an interleaved pixel buffer with 3 or 4 channels.
    ///
    /// A fourth (alpha) channel is dropped.
    pub fn from_raw(
        data: &[u8],
        width: u32,
        height: u32,
        channels: usize,
        order: ChannelOrder,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        if channels != 3 && channels != 4 {
            return Err(FrameError::UnsupportedChannels(channels));
        }

        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let mut image = RgbImage::new(width, height);
        for (pixel, chunk) in image.pixels_mut().zip(data.chunks_exact(channels)) {
            *pixel = match order {
                ChannelOrder::Rgb => Rgb([chunk[0], chunk[1], chunk[2]]),
                ChannelOrder::Bgr => Rgb([chunk[2], chunk[1], chunk[0]]),
            };
        }

        Self::from_image(image)
    }

    /// Wrap an already decoded RGB image
    pub fn from_image(image: RgbImage) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        Ok(Self {
            image,
            timestamp: Instant::now(),
        })
    }

    /// Decode an image file (any format supported by the `image` crate)
    pub fn open(path: &Path) -> Result<Self, FrameError> {
        let image = image::open(path)?.to_rgb8();
        Self::from_image(image)
    }

    /// The RGB image
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
