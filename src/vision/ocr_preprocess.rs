//! Crop preprocessing for text recognition
//!
//! Plates are read under very different lighting, so each region is handed to
//! the recognizer several times with different binarizations and contrast
//! enhancements. Whichever variant reads best wins later.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use tracing::debug;

use super::filters::{adaptive_threshold, clahe, otsu_binarize};
use super::region::BoundingBox;
use crate::config::RecognitionConfig;

/// How a variant was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// Global Otsu binarization
    Otsu,
    /// Gaussian-weighted local threshold
    Adaptive,
    /// CLAHE equalization followed by Otsu
    Clahe,
    /// Inverted Otsu, for light text on dark plates
    InvertedOtsu,
    /// Plain grayscale
    Grayscale,
}

/// One preprocessed rendition of a crop
#[derive(Debug, Clone)]
pub struct OcrVariant {
    pub kind: VariantKind,
    pub image: GrayImage,
}

/// Why a region was not cropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropRejected {
    /// The padded crop is empty or below the minimum readable size
    TooSmall { width: u32, height: u32 },
}

/// Crops regions out of an image and renders recognition variants
#[derive(Debug, Clone)]
pub struct CropPreprocessor {
    padding: u32,
    min_width: u32,
    min_height: u32,
    target_height: u32,
    adaptive_block_size: u32,
    adaptive_offset: f32,
    clahe_clip_limit: f32,
    clahe_tiles: u32,
}

impl Default for CropPreprocessor {
    fn default() -> Self {
        Self::from_config(&RecognitionConfig::default())
    }
}

impl CropPreprocessor {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            padding: config.crop_padding,
            min_width: config.min_crop_width,
            min_height: config.min_crop_height,
            target_height: config.target_height,
            adaptive_block_size: config.adaptive_block_size,
            adaptive_offset: config.adaptive_offset,
            clahe_clip_limit: config.clahe_clip_limit,
            clahe_tiles: config.clahe_tiles,
        }
    }

    /// Cut out the padded region as grayscale, upscaled to the target height when short
    pub fn crop(&self, image: &RgbImage, bbox: &BoundingBox) -> Result<GrayImage, CropRejected> {
        let (img_w, img_h) = image.dimensions();
        let padded = bbox.padded(self.padding, img_w, img_h);
        let (width, height) = (padded.width(), padded.height());

        if width == 0 || height == 0 || height < self.min_height || width < self.min_width {
            return Err(CropRejected::TooSmall { width, height });
        }

        let region = imageops::crop_imm(image, padded.x1, padded.y1, width, height).to_image();
        let gray = imageops::grayscale(&region);

        if height < self.target_height {
            let scale = self.target_height as f32 / height as f32;
            let new_width = ((width as f32 * scale) as u32).max(1);
            debug!(
                "Upscaling {}x{} crop to {}x{}",
                width, height, new_width, self.target_height
            );
            return Ok(imageops::resize(
                &gray,
                new_width,
                self.target_height,
                FilterType::CatmullRom,
            ));
        }

        Ok(gray)
    }

    /// Render the five recognition variants of a grayscale crop, in fixed order:
    /// Otsu, adaptive, CLAHE + Otsu, inverted Otsu, grayscale
    pub fn variants(&self, gray: &GrayImage) -> Vec<OcrVariant> {
        let equalized = clahe(gray, self.clahe_clip_limit, self.clahe_tiles);

        vec![
            OcrVariant {
                kind: VariantKind::Otsu,
                image: otsu_binarize(gray, false),
            },
            OcrVariant {
                kind: VariantKind::Adaptive,
                image: adaptive_threshold(gray, self.adaptive_block_size, self.adaptive_offset),
            },
            OcrVariant {
                kind: VariantKind::Clahe,
                image: otsu_binarize(&equalized, false),
            },
            OcrVariant {
                kind: VariantKind::InvertedOtsu,
                image: otsu_binarize(gray, true),
            },
            OcrVariant {
                kind: VariantKind::Grayscale,
                image: gray.clone(),
            },
        ]
    }

    /// Crop a region and render its variants
    pub fn prepare(
        &self,
        image: &RgbImage,
        bbox: &BoundingBox,
    ) -> Result<Vec<OcrVariant>, CropRejected> {
        let gray = self.crop(image, bbox)?;
        Ok(self.variants(&gray))
    }
}
