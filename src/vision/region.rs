//! Region types shared by the proposal, merge and aggregation stages

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `x2`/`y2` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Create a box from corner coordinates
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from a top-left corner and a size
    pub fn from_rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// The whole image
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Whether the box has positive width and height
    pub fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// Area shared with `other`
    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) as u64 * (y2 - y1) as u64
        } else {
            0
        }
    }

    /// Smallest box containing both boxes
    pub fn envelope(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Grow by `padding` on every side, clamped to a `width` x `height` image
    pub fn padded(&self, padding: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox::new(
            self.x1.saturating_sub(padding),
            self.y1.saturating_sub(padding),
            self.x2.saturating_add(padding).min(width),
            self.y2.saturating_add(padding).min(height),
        )
    }
}

/// Strategy that produced a candidate region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalMethod {
    /// Yellow/white color segmentation
    Color,
    /// Edge map contours
    Edge,
    /// Morphological top-hat
    Morph,
    /// Learned bounding-box regressor
    Model,
}

/// A plate-shaped region proposed by one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    pub bbox: BoundingBox,
    pub method: ProposalMethod,
    /// Strategy confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl CandidateRegion {
    pub fn new(bbox: BoundingBox, method: ProposalMethod, confidence: f32) -> Self {
        Self {
            bbox,
            method,
            confidence,
        }
    }

    pub fn area(&self) -> u64 {
        self.bbox.area()
    }
}

/// Overlapping candidates consolidated into one region
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRegion {
    /// Union envelope of the constituent boxes
    pub bbox: BoundingBox,
    /// Mean constituent confidence boosted by group size
    pub confidence: f32,
    /// Number of candidates merged into this region
    pub constituent_count: usize,
}
