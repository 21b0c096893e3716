//! Vision Layer
//!
//! Finds license plates in a still image and reads them:
//! - `detection`: heuristic region proposal ensemble
//! - `merge`: overlapping proposal consolidation
//! - `ocr_preprocess`: crop variants for recognition
//! - `ocr`: recognizer seam and the ONNX CTC recognizer
//! - `locator`: optional learned plate locator
//!
//! [`PlateEngine`] ties the stages together and aggregates the readings.

pub mod detection;
pub mod filters;
pub mod locator;
pub mod merge;
pub mod models;
pub mod ocr;
pub mod ocr_preprocess;
pub mod preprocess;
pub mod region;

use image::{GrayImage, RgbImage};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use detection::{CandidateProposer, GeometryFilter, RegionProposer, Scene};
pub use locator::{load_locator, OnnxPlateLocator, PlateLocator};
pub use merge::RegionMerger;
pub use models::{ModelKind, ModelManager, OnnxSession};
pub use ocr::{OcrReading, OnnxTextRecognizer, TextRecognitionRunner, TextRecognizer, TextRegion};
pub use ocr_preprocess::{CropPreprocessor, CropRejected, OcrVariant, VariantKind};
pub use region::{BoundingBox, CandidateRegion, MergedRegion, ProposalMethod};

use crate::capture::Frame;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plate::TextNormalizer;

/// Confidence assigned to a plate read from the concatenation of all readings
const CONCATENATED_CONFIDENCE: f32 = 1.0;

/// A validated plate found in an image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Region the plate was read from, in image coordinates
    pub bbox: BoundingBox,
    /// Validated plate string
    pub plate_text: String,
    /// Confidence of the region (merged proposal confidence)
    pub region_confidence: f32,
    /// Recognizer confidence of the chosen reading
    pub reading_confidence: f32,
}

/// License plate recognition engine.
///
/// Calls on one engine serialize at the recognizer; pool one engine per
/// worker for parallel recognition.
pub struct PlateEngine {
    config: EngineConfig,
    proposer: CandidateProposer,
    merger: RegionMerger,
    cropper: CropPreprocessor,
    runner: TextRecognitionRunner,
    normalizer: TextNormalizer,
    recognizer: Mutex<Box<dyn TextRecognizer>>,
    locator: Option<Mutex<Box<dyn PlateLocator>>>,
}

impl PlateEngine {
    /// Create an engine around a text recognizer
    pub fn new(config: EngineConfig, recognizer: Box<dyn TextRecognizer>) -> Result<Self, EngineError> {
        let normalizer = TextNormalizer::from_config(&config.grammar)?;

        info!(
            "Plate engine ready: {} region codes, top {} regions",
            normalizer.grammar().region_code_count(),
            config.proposal.max_regions
        );

        Ok(Self {
            proposer: CandidateProposer::from_config(&config.proposal),
            merger: RegionMerger::new(config.proposal.merge_overlap),
            cropper: CropPreprocessor::from_config(&config.recognition),
            runner: TextRecognitionRunner::from_config(&config.recognition),
            normalizer,
            recognizer: Mutex::new(recognizer),
            locator: None,
            config,
        })
    }

    /// Create an engine with the ONNX recognizer and, when available, the ONNX locator
    pub fn from_models(config: EngineConfig, manager: &ModelManager) -> Result<Self, EngineError> {
        let recognizer = OnnxTextRecognizer::from_config(&config.model.recognizer, manager)?;
        let locator = load_locator(&config.model, manager, config.model.recognizer.intra_threads);

        let engine = Self::new(config, Box::new(recognizer))?;
        Ok(match locator {
            Some(locator) => engine.with_locator(locator),
            None => engine,
        })
    }

    /// Attach a learned plate locator
    pub fn with_locator(mut self, locator: Box<dyn PlateLocator>) -> Self {
        self.locator = Some(Mutex::new(locator));
        self
    }

    /// Replace the heuristic proposal ensemble
    pub fn with_proposer(mut self, proposer: CandidateProposer) -> Self {
        self.proposer = proposer;
        self
    }

    pub fn has_locator(&self) -> bool {
        self.locator.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Detect and read plates in a frame
    pub fn detect_frame(&self, frame: &Frame) -> Result<Vec<DetectionResult>, EngineError> {
        self.detect(frame.image())
    }

    /// Detect and read plates.
    ///
    /// Results are ordered by region confidence and carry distinct plate
    /// texts. Finding nothing is not an error.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionResult>, EngineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidImage { width, height });
        }

        let start = Instant::now();
        let regions = self.regions(image);
        debug!("Reading {} regions", regions.len());

        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for (idx, region) in regions.iter().enumerate() {
            let Some((plate_text, reading_confidence)) = self.read_region(image, region) else {
                debug!("Region {} ({:?}) yielded no plate", idx + 1, region.bbox);
                continue;
            };

            if !seen.insert(plate_text.clone()) {
                debug!("Region {} repeats plate {}", idx + 1, plate_text);
                continue;
            }

            debug!("Region {} yielded {}", idx + 1, plate_text);
            results.push(DetectionResult {
                bbox: region.bbox,
                plate_text,
                region_confidence: region.confidence,
                reading_confidence,
            });
        }

        if results.is_empty() && self.config.recognition.whole_image_fallback {
            results.extend(self.read_whole_image(image));
        }

        debug!(
            "Detection complete in {:?}: {} plates",
            start.elapsed(),
            results.len()
        );

        Ok(results)
    }

    /// Regions to read: a trusted locator box, else the top merged proposals
    pub fn regions(&self, image: &RgbImage) -> Vec<MergedRegion> {
        if let Some(region) = self.locate(image) {
            debug!("Using locator region {:?}", region.bbox);
            return vec![MergedRegion {
                bbox: region.bbox,
                confidence: region.confidence,
                constituent_count: 1,
            }];
        }

        let candidates = self.proposer.propose(image);
        let mut merged = self.merger.merge(candidates);
        merged.truncate(self.config.proposal.max_regions);
        merged
    }

    fn locate(&self, image: &RgbImage) -> Option<CandidateRegion> {
        if !self.config.model.use_locator {
            return None;
        }
        let locator = self.locator.as_ref()?;

        let raw = match locator.lock().locate(image) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Plate locator failed, using heuristic detection: {}", e);
                return None;
            }
        };

        let (width, height) = image.dimensions();
        let region = detection::locator_region(
            raw,
            width,
            height,
            self.config.model.locator_min_width,
            self.config.model.locator_min_height,
        );
        if region.is_none() {
            debug!("Locator box {:?} too small, using heuristic detection", raw);
        }
        region
    }

    /// Best validated plate of one region with its reading confidence
    fn read_region(&self, image: &RgbImage, region: &MergedRegion) -> Option<(String, f32)> {
        let variants = match self.cropper.prepare(image, &region.bbox) {
            Ok(variants) => variants,
            Err(rejected) => {
                debug!("Skipping region {:?}: {:?}", region.bbox, rejected);
                return None;
            }
        };

        let readings = {
            let mut recognizer = self.recognizer.lock();
            self.runner.run(&mut **recognizer, &variants)
        };

        select_plate(&self.normalizer, &readings)
    }

    /// Last resort: read the whole grayscale image at once
    fn read_whole_image(&self, image: &RgbImage) -> Option<DetectionResult> {
        let gray: GrayImage = image::imageops::grayscale(image);

        let regions = match self.recognizer.lock().recognize(&gray) {
            Ok(regions) => regions,
            Err(e) => {
                warn!("Whole-image recognition failed: {}", e);
                return None;
            }
        };

        let combined: String = regions.iter().map(|r| r.text.as_str()).collect();
        let plate_text = self.normalizer.normalize(&combined)?;
        let reading_confidence = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32
        };

        debug!("Whole-image fallback yielded {}", plate_text);
        let (width, height) = image.dimensions();
        Some(DetectionResult {
            bbox: BoundingBox::full(width, height),
            plate_text,
            region_confidence: 0.0,
            reading_confidence,
        })
    }
}

/// Highest-confidence plate among the readings (first wins ties).
///
/// When no single reading is a plate but there are several, their
/// concatenation is tried as one reading.
pub fn select_plate(normalizer: &TextNormalizer, readings: &[OcrReading]) -> Option<(String, f32)> {
    let mut best: Option<(String, f32)> = None;

    for reading in readings {
        let Some(plate) = normalizer.normalize(&reading.text) else {
            continue;
        };
        if best.as_ref().map_or(true, |(_, c)| reading.confidence > *c) {
            best = Some((plate, reading.confidence));
        }
    }

    if best.is_none() && readings.len() > 1 {
        let combined: String = readings.iter().map(|r| r.text.as_str()).collect();
        best = normalizer
            .normalize(&combined)
            .map(|plate| (plate, CONCATENATED_CONFIDENCE));
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LocatorError, RecognizerError};
    use image::Rgb;

    type Recognized = Result<Vec<TextRegion>, RecognizerError>;

    const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

    struct FixedProposer(Vec<CandidateRegion>);

    impl RegionProposer for FixedProposer {
        fn method(&self) -> ProposalMethod {
            ProposalMethod::Color
        }

        fn propose(&self, _scene: &Scene<'_>) -> Vec<CandidateRegion> {
            self.0.clone()
        }
    }

    fn fixed(boxes: &[(BoundingBox, f32)]) -> CandidateProposer {
        let candidates = boxes
            .iter()
            .map(|(bbox, c)| CandidateRegion::new(*bbox, ProposalMethod::Color, *c))
            .collect();
        CandidateProposer::with_proposers(vec![Box::new(FixedProposer(candidates))])
    }

    fn reads(text: &'static str) -> Box<dyn TextRecognizer> {
        Box::new(move |image: &GrayImage| -> Recognized {
            let (w, h) = image.dimensions();
            Ok(vec![TextRegion::whole(text, 0.9, w, h)])
        })
    }

    fn reads_nothing() -> Box<dyn TextRecognizer> {
        Box::new(|_: &GrayImage| -> Recognized { Ok(vec![]) })
    }

    fn yellow_plate_scene() -> RgbImage {
        let mut image = RgbImage::from_pixel(640, 480, BACKGROUND);
        for y in 200..250 {
            for x in 200..375 {
                image.put_pixel(x, y, Rgb([255, 210, 0]));
            }
        }
        image
    }

    fn reading(text: &str, confidence: f32) -> OcrReading {
        OcrReading {
            text: text.to_string(),
            confidence,
            variant: VariantKind::Otsu,
        }
    }

    fn normalizer() -> TextNormalizer {
        TextNormalizer::from_config(&EngineConfig::default().grammar).unwrap()
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PlateEngine>();
    }

    #[test]
    fn test_yellow_plate_end_to_end() {
        let engine = PlateEngine::new(EngineConfig::default(), reads("KA01AB1234")).unwrap();
        let results = engine.detect(&yellow_plate_scene()).unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.plate_text, "KA01AB1234");
        assert!(result.bbox.x1.abs_diff(200) <= 8);
        assert!(result.bbox.y1.abs_diff(200) <= 8);
        assert!(result.bbox.x2.abs_diff(375) <= 8);
        assert!(result.bbox.y2.abs_diff(250) <= 8);
        assert!(result.region_confidence > 0.8);
    }

    #[test]
    fn test_confusable_reading_corrected() {
        let engine = PlateEngine::new(EngineConfig::default(), reads("KA0lAB1234")).unwrap();
        let results = engine.detect(&yellow_plate_scene()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plate_text, "KA01AB1234");
    }

    #[test]
    fn test_empty_scene_returns_nothing() {
        let engine = PlateEngine::new(EngineConfig::default(), reads_nothing()).unwrap();
        let image = RgbImage::from_pixel(320, 240, BACKGROUND);
        assert!(engine.detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_zero_size_image_rejected() {
        let engine = PlateEngine::new(EngineConfig::default(), reads_nothing()).unwrap();
        let result = engine.detect(&RgbImage::new(0, 10));
        assert!(matches!(
            result,
            Err(EngineError::InvalidImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_duplicate_plates_keep_strongest_region() {
        // Overlap is a quarter of either box, too little to merge
        let strong = BoundingBox::new(50, 50, 250, 100);
        let weak = BoundingBox::new(200, 50, 400, 100);
        let engine = PlateEngine::new(EngineConfig::default(), reads("MH12AB1234"))
            .unwrap()
            .with_proposer(fixed(&[(weak, 0.5), (strong, 0.9)]));

        let results = engine.detect(&RgbImage::from_pixel(640, 480, BACKGROUND)).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, strong);
        assert!((results[0].region_confidence - 0.99).abs() < 1e-5);
    }

    #[test]
    fn test_only_top_regions_are_read() {
        const MARKED: u8 = 200;

        // Six disjoint 120x40 boxes, confidence falling 0.9 .. 0.4
        let boxes: Vec<(BoundingBox, f32)> = (0..6u32)
            .map(|i| {
                let bbox = BoundingBox::from_rect(20 + (i % 3) * 200, 40 + (i / 3) * 200, 120, 40);
                (bbox, 0.9 - i as f32 * 0.1)
            })
            .collect();

        // Only the weakest box carries the marked intensity
        let mut image = RgbImage::from_pixel(640, 480, BACKGROUND);
        for (i, (bbox, _)) in boxes.iter().enumerate() {
            let shade = if i == 5 { MARKED } else { 100 };
            for y in bbox.y1..bbox.y2 {
                for x in bbox.x1..bbox.x2 {
                    image.put_pixel(x, y, Rgb([shade, shade, shade]));
                }
            }
        }

        let reads_marked = || -> Box<dyn TextRecognizer> {
            Box::new(|crop: &GrayImage| -> Recognized {
                let (w, h) = crop.dimensions();
                if crop.pixels().any(|p| p[0] == MARKED) {
                    Ok(vec![TextRegion::whole("UP16ZT2020", 0.9, w, h)])
                } else {
                    Ok(vec![])
                }
            })
        };

        let mut config = EngineConfig::default();
        config.recognition.whole_image_fallback = false;
        assert_eq!(config.proposal.max_regions, 5);

        let engine = PlateEngine::new(config.clone(), reads_marked())
            .unwrap()
            .with_proposer(fixed(&boxes));
        assert_eq!(engine.regions(&image).len(), 5);
        assert!(engine.detect(&image).unwrap().is_empty());

        // The same scene with room for a sixth region finds the plate
        config.proposal.max_regions = 6;
        let engine = PlateEngine::new(config, reads_marked())
            .unwrap()
            .with_proposer(fixed(&boxes));
        let results = engine.detect(&image).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plate_text, "UP16ZT2020");
        assert_eq!(results[0].bbox, boxes[5].0);
    }

    #[test]
    fn test_results_within_image_bounds() {
        let engine = PlateEngine::new(EngineConfig::default(), reads("DL03CA1234")).unwrap();
        let image = yellow_plate_scene();
        let (w, h) = image.dimensions();
        for result in engine.detect(&image).unwrap() {
            assert!(result.bbox.x1 < result.bbox.x2 && result.bbox.x2 <= w);
            assert!(result.bbox.y1 < result.bbox.y2 && result.bbox.y2 <= h);
        }
    }

    #[test]
    fn test_trusted_locator_skips_heuristics() {
        let heuristic = BoundingBox::new(50, 50, 250, 100);
        let locator = |_: &RgbImage| -> Result<[f32; 4], LocatorError> { Ok([0.5, 0.5, 0.75, 0.625]) };
        let engine = PlateEngine::new(EngineConfig::default(), reads("TN09BC4321"))
            .unwrap()
            .with_proposer(fixed(&[(heuristic, 0.9)]))
            .with_locator(Box::new(locator));

        let results = engine.detect(&RgbImage::from_pixel(640, 480, BACKGROUND)).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, BoundingBox::new(320, 240, 480, 300));
        assert_eq!(results[0].plate_text, "TN09BC4321");
    }

    #[test]
    fn test_small_or_failing_locator_falls_through() {
        let heuristic = BoundingBox::new(50, 50, 250, 100);

        let tiny = |_: &RgbImage| -> Result<[f32; 4], LocatorError> { Ok([0.1, 0.1, 0.12, 0.11]) };
        let engine = PlateEngine::new(EngineConfig::default(), reads("TN09BC4321"))
            .unwrap()
            .with_proposer(fixed(&[(heuristic, 0.9)]))
            .with_locator(Box::new(tiny));
        let results = engine.detect(&RgbImage::from_pixel(640, 480, BACKGROUND)).unwrap();
        assert_eq!(results[0].bbox, heuristic);

        let broken = |_: &RgbImage| -> Result<[f32; 4], LocatorError> {
            Err(LocatorError::Output("no output".to_string()))
        };
        let engine = PlateEngine::new(EngineConfig::default(), reads("TN09BC4321"))
            .unwrap()
            .with_proposer(fixed(&[(heuristic, 0.9)]))
            .with_locator(Box::new(broken));
        let results = engine.detect(&RgbImage::from_pixel(640, 480, BACKGROUND)).unwrap();
        assert_eq!(results[0].bbox, heuristic);
    }

    #[test]
    fn test_locator_ignored_when_disabled() {
        let mut config = EngineConfig::default();
        config.model.use_locator = false;
        let heuristic = BoundingBox::new(50, 50, 250, 100);
        let locator = |_: &RgbImage| -> Result<[f32; 4], LocatorError> { Ok([0.5, 0.5, 0.75, 0.625]) };

        let engine = PlateEngine::new(config, reads("TN09BC4321"))
            .unwrap()
            .with_proposer(fixed(&[(heuristic, 0.9)]))
            .with_locator(Box::new(locator));
        let results = engine.detect(&RgbImage::from_pixel(640, 480, BACKGROUND)).unwrap();
        assert_eq!(results[0].bbox, heuristic);
    }

    #[test]
    fn test_whole_image_fallback() {
        // No regions at all; the whole image reads as a plate split in two
        let recognizer = Box::new(|_: &GrayImage| -> Recognized {
            Ok(vec![
                TextRegion::whole("GJ05", 0.6, 1, 1),
                TextRegion::whole("CD7777", 0.8, 1, 1),
            ])
        });
        let engine = PlateEngine::new(EngineConfig::default(), recognizer).unwrap();
        let results = engine.detect(&RgbImage::from_pixel(320, 240, BACKGROUND)).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plate_text, "GJ05CD7777");
        assert_eq!(results[0].bbox, BoundingBox::full(320, 240));
        assert!((results[0].reading_confidence - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_whole_image_fallback_disabled() {
        let mut config = EngineConfig::default();
        config.recognition.whole_image_fallback = false;
        let engine = PlateEngine::new(config, reads("GJ05CD7777")).unwrap();
        assert!(engine
            .detect(&RgbImage::from_pixel(320, 240, BACKGROUND))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_recognizer_failure_yields_empty() {
        let recognizer = Box::new(|_: &GrayImage| -> Recognized {
            Err(RecognizerError::Failed("offline".to_string()))
        });
        let engine = PlateEngine::new(EngineConfig::default(), recognizer).unwrap();
        assert!(engine.detect(&yellow_plate_scene()).unwrap().is_empty());
    }

    #[test]
    fn test_select_plate_prefers_confident_reading() {
        let readings = vec![
            reading("KA01AB1234", 0.5),
            reading("garbage", 0.99),
            reading("RJ11CV0002", 0.8),
            reading("MH12XY9999", 0.8),
        ];
        assert_eq!(
            select_plate(&normalizer(), &readings),
            Some(("RJ11CV0002".to_string(), 0.8))
        );
    }

    #[test]
    fn test_select_plate_concatenates_fragments() {
        let readings = vec![reading("KA01", 0.4), reading("AB1234", 0.6)];
        assert_eq!(
            select_plate(&normalizer(), &readings),
            Some(("KA01AB1234".to_string(), 1.0))
        );

        // A single fragment is not concatenated
        assert_eq!(select_plate(&normalizer(), &[reading("KA01", 0.4)]), None);
        assert_eq!(select_plate(&normalizer(), &[]), None);
    }
}
