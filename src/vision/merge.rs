//! Region merging
//!
//! Strategies frequently propose the same plate with slightly different boxes.
//! Overlapping proposals are folded into their union envelope; agreement between
//! strategies raises the merged confidence.

use tracing::debug;

use super::region::{CandidateRegion, MergedRegion};

/// Confidence boost per merged constituent
const CONSTITUENT_BOOST: f32 = 0.1;

/// Greedy largest-first merger for candidate regions
#[derive(Debug, Clone)]
pub struct RegionMerger {
    /// Intersection must exceed this fraction of the smaller box's area
    min_overlap: f32,
}

impl Default for RegionMerger {
    fn default() -> Self {
        Self { min_overlap: 0.5 }
    }
}

impl RegionMerger {
    /// Create a merger with a custom overlap fraction
    pub fn new(min_overlap: f32) -> Self {
        Self { min_overlap }
    }

    /// Merge overlapping candidates.
    ///
    /// Candidates are visited largest first; each unconsumed candidate seeds a
    /// group and absorbs every later unconsumed candidate that overlaps the seed
    /// enough. The result is sorted by confidence, highest first.
    pub fn merge(&self, mut candidates: Vec<CandidateRegion>) -> Vec<MergedRegion> {
        if candidates.is_empty() {
            return vec![];
        }

        candidates.sort_by(|a, b| b.area().cmp(&a.area()));

        let mut consumed = vec![false; candidates.len()];
        let mut merged = Vec::new();

        for i in 0..candidates.len() {
            if consumed[i] {
                continue;
            }
            consumed[i] = true;

            let seed = &candidates[i];
            let mut bbox = seed.bbox;
            let mut confidence_sum = seed.confidence;
            let mut count = 1usize;

            for j in (i + 1)..candidates.len() {
                if consumed[j] {
                    continue;
                }
                let other = &candidates[j];
                if self.overlaps(seed, other) {
                    bbox = bbox.envelope(&other.bbox);
                    confidence_sum += other.confidence;
                    count += 1;
                    consumed[j] = true;
                }
            }

            let mean = confidence_sum / count as f32;
            merged.push(MergedRegion {
                bbox,
                confidence: mean * (1.0 + count as f32 * CONSTITUENT_BOOST),
                constituent_count: count,
            });
        }

        merged.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            "Merged {} candidates into {} regions",
            candidates.len(),
            merged.len()
        );

        merged
    }

    fn overlaps(&self, a: &CandidateRegion, b: &CandidateRegion) -> bool {
        let smaller = a.area().min(b.area()) as f64;
        a.bbox.intersection_area(&b.bbox) as f64 > self.min_overlap as f64 * smaller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::region::{BoundingBox, ProposalMethod};

    fn candidate(x1: u32, y1: u32, x2: u32, y2: u32, confidence: f32) -> CandidateRegion {
        CandidateRegion::new(
            BoundingBox::new(x1, y1, x2, y2),
            ProposalMethod::Color,
            confidence,
        )
    }

    #[test]
    fn test_empty_input() {
        assert!(RegionMerger::default().merge(vec![]).is_empty());
    }

    #[test]
    fn test_isolated_candidate_gets_single_boost() {
        let merged = RegionMerger::default().merge(vec![candidate(0, 0, 100, 30, 0.8)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].constituent_count, 1);
        assert!((merged[0].confidence - 0.88).abs() < 1e-5);
        assert_eq!(merged[0].bbox, BoundingBox::new(0, 0, 100, 30));
    }

    #[test]
    fn test_overlapping_candidates_merge_to_envelope() {
        let merged = RegionMerger::default().merge(vec![
            candidate(100, 100, 300, 160, 0.8),
            candidate(110, 105, 310, 165, 0.6),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, BoundingBox::new(100, 100, 310, 165));
        assert_eq!(merged[0].constituent_count, 2);
        // mean 0.7 boosted by 1.2
        assert!((merged[0].confidence - 0.84).abs() < 1e-5);
    }

    #[test]
    fn test_small_overlap_does_not_merge() {
        // Intersection 10x50 = 500, smaller area 5000: well under half
        let merged = RegionMerger::default().merge(vec![
            candidate(0, 0, 100, 50, 0.8),
            candidate(90, 0, 190, 50, 0.6),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_contained_box_merges() {
        // A small box fully inside a large one overlaps 100% of the smaller
        let merged = RegionMerger::default().merge(vec![
            candidate(50, 50, 70, 60, 0.7),
            candidate(0, 0, 400, 100, 0.6),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, BoundingBox::new(0, 0, 400, 100));
    }

    #[test]
    fn test_each_candidate_consumed_once() {
        let merged = RegionMerger::default().merge(vec![
            candidate(0, 0, 200, 50, 0.8),
            candidate(5, 0, 205, 50, 0.7),
            candidate(10, 0, 210, 50, 0.6),
            candidate(500, 500, 600, 530, 0.6),
        ]);
        let total: usize = merged.iter().map(|m| m.constituent_count).sum();
        assert_eq!(total, 4);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_sorted_by_confidence() {
        let merged = RegionMerger::default().merge(vec![
            candidate(0, 0, 300, 60, 0.6),
            candidate(500, 500, 600, 530, 0.8),
        ]);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].confidence >= merged[1].confidence);
        assert_eq!(merged[0].bbox, BoundingBox::new(500, 500, 600, 530));
    }
}
