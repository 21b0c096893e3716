//! Error types
//!
//! Library-facing errors. An empty detection list is never an error; only
//! input-contract violations and capability initialization failures surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the recognition engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input image: {width}x{height} (image must have non-zero dimensions)")]
    InvalidImage { width: u32, height: u32 },
    #[error("failed to compile plate grammar: {0}")]
    Grammar(#[from] regex::Error),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Errors raised by a text recognizer for a single call
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("failed to load recognizer model {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("recognizer inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("unexpected recognizer output: {0}")]
    Output(String),
    #[error("recognizer failed: {0}")]
    Failed(String),
}

/// Errors raised by a learned plate locator
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("failed to load locator model {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("locator inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("unexpected locator output: {0}")]
    Output(String),
}

/// Errors building a frame from a raw pixel buffer
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame has zero area: {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("unsupported channel count {0} (expected 3 or 4)")]
    UnsupportedChannels(usize),
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors loading or saving configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
