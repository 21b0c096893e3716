//! Plate region proposal
//!
//! An ensemble of independent heuristic strategies, each finding plate-shaped
//! regions its own way:
//! - color: yellow/white segmentation in HSV
//! - edge: Canny edges, dilated, scored by contour extent
//! - morph: top-hat highlighted bright strips, Otsu thresholded
//!
//! Strategies never filter each other; their outputs are unioned and handed to
//! the merger. A learned locator box, when trusted, replaces the ensemble.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate, grayscale_close, open, Mask};
use imageproc::point::Point;
use std::time::Instant;
use tracing::debug;

use super::filters::{hsv_mask, otsu_binarize, rect_mask, top_hat, HsvRange};
use super::region::{BoundingBox, CandidateRegion, ProposalMethod};
use crate::config::ProposalConfig;

/// Yellow commercial plates
const YELLOW_PLATE: HsvRange = HsvRange::new([18, 70, 100], [35, 255, 255]);
/// White private plates
const WHITE_PLATE: HsvRange = HsvRange::new([0, 0, 180], [180, 35, 255]);

/// Sigma of a 5x5 Gaussian kernel
const EDGE_BLUR_SIGMA: f32 = 1.1;
/// Two 3x3 dilations
const EDGE_DILATE_RADIUS: u8 = 2;
/// 5x5 square for mask cleanup
const COLOR_MORPH_RADIUS: u8 = 2;
/// Top-hat kernel, wide enough to span a character row
const TOP_HAT_KERNEL: (u32, u32) = (30, 5);
/// Closing kernel joining characters into one strip
const STRIP_CLOSE_KERNEL: (u32, u32) = (17, 3);

/// Confidence assigned to a trusted locator box
pub const LOCATOR_CONFIDENCE: f32 = 1.0;

/// Plate-shape constraints shared by every heuristic strategy
#[derive(Debug, Clone, Copy)]
pub struct GeometryFilter {
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width_fraction: f32,
    pub max_height_fraction: f32,
}

impl GeometryFilter {
    pub fn from_config(config: &ProposalConfig) -> Self {
        Self {
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
            min_width: config.min_width,
            min_height: config.min_height,
            max_width_fraction: config.max_width_fraction,
            max_height_fraction: config.max_height_fraction,
        }
    }

    /// Whether a box inside an `image_width` x `image_height` image looks like a plate.
    /// All bounds are exclusive.
    pub fn accepts(&self, bbox: &BoundingBox, image_width: u32, image_height: u32) -> bool {
        let (w, h) = (bbox.width(), bbox.height());
        if h == 0 {
            return false;
        }
        let aspect = w as f32 / h as f32;

        aspect > self.min_aspect_ratio
            && aspect < self.max_aspect_ratio
            && w > self.min_width
            && h > self.min_height
            && (w as f32) < self.max_width_fraction * image_width as f32
            && (h as f32) < self.max_height_fraction * image_height as f32
    }
}

impl Default for GeometryFilter {
    fn default() -> Self {
        Self::from_config(&ProposalConfig::default())
    }
}

/// Image views shared by all strategies for one proposal pass
pub struct Scene<'a> {
    pub image: &'a RgbImage,
    pub gray: GrayImage,
}

impl<'a> Scene<'a> {
    pub fn new(image: &'a RgbImage) -> Self {
        Self {
            image,
            gray: image::imageops::grayscale(image),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A single region-proposal strategy
pub trait RegionProposer: Send + Sync {
    /// Strategy tag attached to every candidate
    fn method(&self) -> ProposalMethod;

    /// Propose plate-shaped regions; never fails, may return nothing
    fn propose(&self, scene: &Scene<'_>) -> Vec<CandidateRegion>;
}

/// Color segmentation: yellow or white plate backgrounds
pub struct ColorProposer {
    filter: GeometryFilter,
    confidence: f32,
}

impl ColorProposer {
    pub fn new(filter: GeometryFilter, confidence: f32) -> Self {
        Self { filter, confidence }
    }
}

impl RegionProposer for ColorProposer {
    fn method(&self) -> ProposalMethod {
        ProposalMethod::Color
    }

    fn propose(&self, scene: &Scene<'_>) -> Vec<CandidateRegion> {
        let (width, height) = scene.dimensions();

        let mask = hsv_mask(scene.image, &[YELLOW_PLATE, WHITE_PLATE]);
        let mask = close(&mask, Norm::LInf, COLOR_MORPH_RADIUS);
        let mask = open(&mask, Norm::LInf, COLOR_MORPH_RADIUS);

        external_bounds(&mask)
            .into_iter()
            .filter(|bbox| self.filter.accepts(bbox, width, height))
            .map(|bbox| CandidateRegion::new(bbox, self.method(), self.confidence))
            .collect()
    }
}

/// Edge density: rectangular outlines with a high fill ratio
pub struct EdgeProposer {
    filter: GeometryFilter,
    confidence: f32,
    thresholds: (f32, f32),
    max_contours: usize,
    min_extent: f32,
}

impl EdgeProposer {
    pub fn new(
        filter: GeometryFilter,
        confidence: f32,
        thresholds: (f32, f32),
        max_contours: usize,
        min_extent: f32,
    ) -> Self {
        Self {
            filter,
            confidence,
            thresholds,
            max_contours,
            min_extent,
        }
    }
}

impl RegionProposer for EdgeProposer {
    fn method(&self) -> ProposalMethod {
        ProposalMethod::Edge
    }

    fn propose(&self, scene: &Scene<'_>) -> Vec<CandidateRegion> {
        let (width, height) = scene.dimensions();

        let blurred = gaussian_blur_f32(&scene.gray, EDGE_BLUR_SIGMA);
        let edges = canny(&blurred, self.thresholds.0, self.thresholds.1);
        let edges = dilate(&edges, Norm::LInf, EDGE_DILATE_RADIUS);

        // Outer and hole borders alike, largest enclosed area first
        let mut scored: Vec<(f64, BoundingBox)> = find_contours::<u32>(&edges)
            .iter()
            .filter_map(|contour| {
                let bbox = contour_bounds(&contour.points)?;
                Some((contour_area(&contour.points), bbox))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.max_contours);

        scored
            .into_iter()
            .filter(|(area, bbox)| {
                self.filter.accepts(bbox, width, height)
                    && *area / bbox.area() as f64 > self.min_extent as f64
            })
            .map(|(_, bbox)| CandidateRegion::new(bbox, self.method(), self.confidence))
            .collect()
    }
}

/// Morphological top-hat: bright character strips on a darker plate or body
pub struct MorphProposer {
    filter: GeometryFilter,
    confidence: f32,
    top_hat_mask: Mask,
    close_mask: Mask,
}

impl MorphProposer {
    pub fn new(filter: GeometryFilter, confidence: f32) -> Self {
        Self {
            filter,
            confidence,
            top_hat_mask: rect_mask(TOP_HAT_KERNEL.0, TOP_HAT_KERNEL.1),
            close_mask: rect_mask(STRIP_CLOSE_KERNEL.0, STRIP_CLOSE_KERNEL.1),
        }
    }
}

impl RegionProposer for MorphProposer {
    fn method(&self) -> ProposalMethod {
        ProposalMethod::Morph
    }

    fn propose(&self, scene: &Scene<'_>) -> Vec<CandidateRegion> {
        let (width, height) = scene.dimensions();

        let hat = top_hat(&scene.gray, &self.top_hat_mask);
        let binary = otsu_binarize(&hat, false);
        let strips = grayscale_close(&binary, &self.close_mask);

        external_bounds(&strips)
            .into_iter()
            .filter(|bbox| self.filter.accepts(bbox, width, height))
            .map(|bbox| CandidateRegion::new(bbox, self.method(), self.confidence))
            .collect()
    }
}

/// Runs every heuristic strategy over an image and unions their proposals
pub struct CandidateProposer {
    proposers: Vec<Box<dyn RegionProposer>>,
}

impl CandidateProposer {
    /// The default color, edge and morph ensemble
    pub fn from_config(config: &ProposalConfig) -> Self {
        let filter = GeometryFilter::from_config(config);
        Self::with_proposers(vec![
            Box::new(ColorProposer::new(filter, config.color_confidence)),
            Box::new(EdgeProposer::new(
                filter,
                config.edge_confidence,
                config.canny_thresholds,
                config.edge_max_contours,
                config.edge_min_extent,
            )),
            Box::new(MorphProposer::new(filter, config.morph_confidence)),
        ])
    }

    /// A custom ensemble
    pub fn with_proposers(proposers: Vec<Box<dyn RegionProposer>>) -> Self {
        Self { proposers }
    }

    /// Run all strategies; the result keeps strategy order
    pub fn propose(&self, image: &RgbImage) -> Vec<CandidateRegion> {
        let scene = Scene::new(image);
        let mut candidates = Vec::new();

        for proposer in &self.proposers {
            let start = Instant::now();
            let found = proposer.propose(&scene);
            debug!(
                "{:?} proposer found {} candidates in {:?}",
                proposer.method(),
                found.len(),
                start.elapsed()
            );
            candidates.extend(found);
        }

        candidates
    }
}

/// Convert a locator output to an image-space box if it is large enough to trust.
///
/// `raw` holds normalized `(x1, y1, x2, y2)`; each coordinate is clamped to
/// [0, 1] before scaling to the image size.
pub fn locator_region(
    raw: [f32; 4],
    image_width: u32,
    image_height: u32,
    min_width: u32,
    min_height: u32,
) -> Option<CandidateRegion> {
    let scale = |value: f32, size: u32| {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        (value * size as f32) as u32
    };

    let bbox = BoundingBox::new(
        scale(raw[0], image_width),
        scale(raw[1], image_height),
        scale(raw[2], image_width),
        scale(raw[3], image_height),
    );

    let trusted = bbox.x2 > bbox.x1
        && bbox.y2 > bbox.y1
        && bbox.width() > min_width
        && bbox.height() > min_height;

    trusted.then(|| CandidateRegion::new(bbox, ProposalMethod::Model, LOCATOR_CONFIDENCE))
}

/// Bounding boxes of the outermost foreground blobs of a binary mask
fn external_bounds(mask: &GrayImage) -> Vec<BoundingBox> {
    find_contours::<u32>(mask)
        .iter()
        .filter(|contour| is_external(contour))
        .filter_map(|contour| contour_bounds(&contour.points))
        .collect()
}

fn is_external(contour: &Contour<u32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Tight bounding box of a contour, end coordinates exclusive
fn contour_bounds(points: &[Point<u32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
    for p in points {
        x1 = x1.min(p.x);
        y1 = y1.min(p.y);
        x2 = x2.max(p.x);
        y2 = y2.max(p.y);
    }
    Some(BoundingBox::new(x1, y1, x2 + 1, y2 + 1))
}

/// Area enclosed by a contour polygon (shoelace formula)
fn contour_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    twice_area.abs() / 2.0
}
