//! Overlay Presentation Layer
//!
//! Draws detection boxes onto a copy of the input image for debugging and
//! operator review. The input image is never modified.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::vision::DetectionResult;

/// Box styling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Outline color
    pub color: Rgb<u8>,
    /// Outline thickness in pixels, drawn inwards from the box edge
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            thickness: 2,
        }
    }
}

/// Draw every detection with the default 2-px green outline
pub fn annotate(image: &RgbImage, results: &[DetectionResult]) -> RgbImage {
    annotate_with(image, results, &OverlayStyle::default())
}

/// Draw every detection with a custom style
pub fn annotate_with(image: &RgbImage, results: &[DetectionResult], style: &OverlayStyle) -> RgbImage {
    let mut canvas = image.clone();

    for result in results {
        let bbox = result.bbox;
        for inset in 0..style.thickness {
            let width = bbox.width().saturating_sub(2 * inset);
            let height = bbox.height().saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((bbox.x1 + inset) as i32, (bbox.y1 + inset) as i32).of_size(width, height);
            draw_hollow_rect_mut(&mut canvas, rect, style.color);
        }
    }

    canvas
}
