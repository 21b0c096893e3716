//! PlateGate - license plate recognition for gate control
//!
//! Finds plates in a still image with an ensemble of heuristic region
//! proposers (or an optional learned locator), reads each region through
//! several preprocessing variants, and validates the text against the plate
//! grammar with confusable-character correction.

pub mod capture;
pub mod config;
pub mod error;
pub mod overlay;
pub mod plate;
pub mod storage;
pub mod vision;

pub use capture::{ChannelOrder, Frame};
pub use config::EngineConfig;
pub use error::{ConfigError, EngineError, FrameError, LocatorError, RecognizerError};
pub use plate::TextNormalizer;
pub use vision::{BoundingBox, DetectionResult, PlateEngine, PlateLocator, TextRecognizer, TextRegion};
