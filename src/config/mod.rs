//! Engine Configuration
//!
//! Recognition thresholds, grammar data and model settings stored in TOML format.
//! Every section falls back to its defaults, so a config file only needs the
//! keys it overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::plate::{DEFAULT_NOISE_TOKENS, DEFAULT_REGION_CODES};

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Region proposal settings
    pub proposal: ProposalConfig,
    /// Cropping, preprocessing and recognition settings
    pub recognition: RecognitionConfig,
    /// Plate grammar data
    pub grammar: GrammarConfig,
    /// Learned model settings
    pub model: ModelConfig,
}

/// Region proposal settings shared by the heuristic strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    /// Confidence assigned to color-segmentation proposals
    pub color_confidence: f32,
    /// Confidence assigned to edge/contour proposals
    pub edge_confidence: f32,
    /// Confidence assigned to top-hat proposals
    pub morph_confidence: f32,
    /// Exclusive lower bound on width / height
    pub min_aspect_ratio: f32,
    /// Exclusive upper bound on width / height
    pub max_aspect_ratio: f32,
    /// Boxes must be wider than this many pixels
    pub min_width: u32,
    /// Boxes must be taller than this many pixels
    pub min_height: u32,
    /// Boxes must be narrower than this fraction of the image width
    pub max_width_fraction: f32,
    /// Boxes must be shorter than this fraction of the image height
    pub max_height_fraction: f32,
    /// Largest edge contours kept before filtering
    pub edge_max_contours: usize,
    /// Minimum contour area / bounding box area for edge proposals
    pub edge_min_extent: f32,
    /// Canny hysteresis thresholds (low, high)
    pub canny_thresholds: (f32, f32),
    /// Merged regions passed on to recognition
    pub max_regions: usize,
    /// Minimum overlap (fraction of the smaller box) for two proposals to merge
    pub merge_overlap: f32,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            color_confidence: 0.8,
            edge_confidence: 0.6,
            morph_confidence: 0.7,
            min_aspect_ratio: 2.0,
            max_aspect_ratio: 6.0,
            min_width: 80,
            min_height: 20,
            max_width_fraction: 0.9,
            max_height_fraction: 0.4,
            edge_max_contours: 30,
            edge_min_extent: 0.5,
            canny_thresholds: (30.0, 200.0),
            max_regions: 5,
            merge_overlap: 0.5,
        }
    }
}

/// Cropping, preprocessing and recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Padding added around each region before cropping
    pub crop_padding: u32,
    /// Crops narrower than this are skipped
    pub min_crop_width: u32,
    /// Crops shorter than this are skipped
    pub min_crop_height: u32,
    /// Crops shorter than this are upscaled to it
    pub target_height: u32,
    /// Readings at or below this confidence are dropped
    pub min_confidence: f32,
    /// Block size of the local adaptive threshold (odd)
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean
    pub adaptive_offset: f32,
    /// CLAHE clip limit
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size (tiles per axis)
    pub clahe_tiles: u32,
    /// Recognize the whole image when no region yields a plate
    pub whole_image_fallback: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            crop_padding: 5,
            min_crop_width: 30,
            min_crop_height: 10,
            target_height: 50,
            min_confidence: 0.1,
            adaptive_block_size: 11,
            adaptive_offset: 2.0,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            whole_image_fallback: true,
        }
    }
}

/// Plate grammar data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Accepted two-letter region codes
    pub region_codes: Vec<String>,
    /// Tokens removed from recognized text before matching
    pub noise_tokens: Vec<String>,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            region_codes: DEFAULT_REGION_CODES.iter().map(|s| s.to_string()).collect(),
            noise_tokens: DEFAULT_NOISE_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Learned model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Consult the plate locator before the heuristic ensemble
    pub use_locator: bool,
    /// Plate locator ONNX model (relative paths resolve against the models dir)
    pub locator_path: Option<PathBuf>,
    /// Square input resolution of the locator
    pub locator_input_size: u32,
    /// Locator boxes must be wider than this to be trusted
    pub locator_min_width: u32,
    /// Locator boxes must be taller than this to be trusted
    pub locator_min_height: u32,
    /// Text recognizer model settings
    pub recognizer: RecognizerModelConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_locator: true,
            locator_path: None,
            locator_input_size: 256,
            locator_min_width: 50,
            locator_min_height: 15,
            recognizer: RecognizerModelConfig::default(),
        }
    }
}

/// ONNX text recognizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerModelConfig {
    /// Recognizer ONNX model (relative paths resolve against the models dir)
    pub path: Option<PathBuf>,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Model input channels (1 or 3)
    pub channels: u32,
    /// Output vocabulary; CTC blank is index 0 so the vocabulary starts at index 1
    pub vocabulary: String,
    /// Intra-op threads for the ONNX session
    pub intra_threads: usize,
}

impl Default for RecognizerModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            input_width: 320,
            input_height: 48,
            channels: 3,
            vocabulary: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string(),
            intra_threads: 4,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_engine_config() {
        let config = EngineConfig::default();

        // Proposal defaults
        assert!((config.proposal.color_confidence - 0.8).abs() < 1e-6);
        assert!((config.proposal.edge_confidence - 0.6).abs() < 1e-6);
        assert!((config.proposal.morph_confidence - 0.7).abs() < 1e-6);
        assert_eq!(config.proposal.min_width, 80);
        assert_eq!(config.proposal.min_height, 20);
        assert_eq!(config.proposal.edge_max_contours, 30);
        assert_eq!(config.proposal.max_regions, 5);

        // Recognition defaults
        assert_eq!(config.recognition.crop_padding, 5);
        assert_eq!(config.recognition.min_crop_width, 30);
        assert_eq!(config.recognition.min_crop_height, 10);
        assert_eq!(config.recognition.target_height, 50);
        assert!((config.recognition.min_confidence - 0.1).abs() < 1e-6);
        assert!(config.recognition.whole_image_fallback);

        // Grammar defaults
        assert!(config.grammar.region_codes.iter().any(|c| c == "KA"));
        assert!(config.grammar.noise_tokens.iter().any(|t| t == "MARUTI"));

        // Model defaults
        assert!(config.model.use_locator);
        assert!(config.model.locator_path.is_none());
        assert_eq!(config.model.locator_input_size, 256);
        assert_eq!(config.model.locator_min_width, 50);
        assert_eq!(config.model.locator_min_height, 15);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = EngineConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.proposal.min_width, parsed.proposal.min_width);
        assert_eq!(config.recognition.target_height, parsed.recognition.target_height);
        assert_eq!(config.grammar.region_codes, parsed.grammar.region_codes);
        assert_eq!(config.model.recognizer.vocabulary, parsed.model.recognizer.vocabulary);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [grammar]
            noise_tokens = ["PARKING"]

            [recognition]
            whole_image_fallback = false
        "#;
        let parsed: EngineConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(parsed.grammar.noise_tokens, vec!["PARKING".to_string()]);
        assert!(parsed.grammar.region_codes.iter().any(|c| c == "RJ"));
        assert!(!parsed.recognition.whole_image_fallback);
        assert_eq!(parsed.recognition.crop_padding, 5);
        assert_eq!(parsed.proposal.max_regions, 5);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = EngineConfig::default();
        config.model.locator_path = Some(PathBuf::from("plate_locator.onnx"));

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.model.locator_path, config.model.locator_path);
        assert_eq!(loaded.proposal.canny_thresholds, config.proposal.canny_thresholds);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
