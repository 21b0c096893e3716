//! OCR (Optical Character Recognition) module
//!
//! The engine talks to text recognition through the [`TextRecognizer`] trait.
//! [`OnnxTextRecognizer`] runs a CRNN-style model with CTC greedy decoding;
//! hosts can plug in any other backend, closures included.

use image::GrayImage;
use std::path::Path;
use tracing::{debug, info, warn};

use super::models::{ModelKind, ModelManager, OnnxSession};
use super::ocr_preprocess::{OcrVariant, VariantKind};
use super::preprocess::prepare_recognizer_input;
use crate::config::{RecognitionConfig, RecognizerModelConfig};
use crate::error::RecognizerError;

/// Detected text region from OCR
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    /// Detected text content
    pub text: String,
    /// Bounding box (x, y, width, height) inside the recognized image
    pub bounds: (u32, u32, u32, u32),
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

impl TextRegion {
    /// A text region spanning a whole `width` x `height` image
    pub fn whole(text: impl Into<String>, confidence: f32, width: u32, height: u32) -> Self {
        Self {
            text: text.into(),
            bounds: (0, 0, width, height),
            confidence,
        }
    }
}

/// Text recognition backend.
///
/// Inputs may be binary, inverted or plain grayscale. Each call is independent;
/// an error fails only that call.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<TextRegion>, RecognizerError>;
}

impl<F> TextRecognizer for F
where
    F: FnMut(&GrayImage) -> Result<Vec<TextRegion>, RecognizerError> + Send,
{
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<TextRegion>, RecognizerError> {
        self(image)
    }
}

/// A raw reading kept for normalization
#[derive(Debug, Clone, PartialEq)]
pub struct OcrReading {
    pub text: String,
    pub confidence: f32,
    /// Variant the reading came from
    pub variant: VariantKind,
}

/// Runs a recognizer over every variant of a crop
#[derive(Debug, Clone)]
pub struct TextRecognitionRunner {
    /// Readings must be strictly above this confidence
    min_confidence: f32,
}

impl Default for TextRecognitionRunner {
    fn default() -> Self {
        Self {
            min_confidence: 0.1,
        }
    }
}

impl TextRecognitionRunner {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::new(config.min_confidence)
    }

    /// Collect confident readings from all variants, in variant order.
    ///
    /// A failing recognizer call is logged and contributes nothing.
    pub fn run(
        &self,
        recognizer: &mut dyn TextRecognizer,
        variants: &[OcrVariant],
    ) -> Vec<OcrReading> {
        let mut readings = Vec::new();

        for variant in variants {
            let regions = match recognizer.recognize(&variant.image) {
                Ok(regions) => regions,
                Err(e) => {
                    warn!("Recognizer failed on {:?} variant: {}", variant.kind, e);
                    continue;
                }
            };

            readings.extend(
                regions
                    .into_iter()
                    .filter(|r| r.confidence > self.min_confidence)
                    .map(|r| OcrReading {
                        text: r.text,
                        confidence: r.confidence,
                        variant: variant.kind,
                    }),
            );
        }

        debug!(
            "{} readings above {} from {} variants",
            readings.len(),
            self.min_confidence,
            variants.len()
        );

        readings
    }
}

/// CRNN text recognizer over ONNX Runtime.
///
/// Expects a `[1, C, H, W]` input and a `[1, T, classes]` (or `[T, 1, classes]`)
/// output where class 0 is the CTC blank and class `i` maps to vocabulary
/// character `i - 1`.
pub struct OnnxTextRecognizer {
    session: OnnxSession,
    vocabulary: Vec<char>,
    input_width: u32,
    input_height: u32,
    channels: usize,
}

impl OnnxTextRecognizer {
    /// Load the model at `path` with the configured input geometry and vocabulary
    pub fn load(path: &Path, config: &RecognizerModelConfig) -> Result<Self, RecognizerError> {
        let session =
            OnnxSession::new(path, config.intra_threads).map_err(|source| RecognizerError::Load {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "{} ready: {}x{}x{}, {} symbols",
            ModelKind::Recognizer.display_name(),
            config.channels,
            config.input_height,
            config.input_width,
            config.vocabulary.chars().count()
        );

        Ok(Self {
            session,
            vocabulary: config.vocabulary.chars().collect(),
            input_width: config.input_width,
            input_height: config.input_height,
            channels: config.channels as usize,
        })
    }

    /// Load the configured model, resolving its path through the model manager
    pub fn from_config(
        config: &RecognizerModelConfig,
        manager: &ModelManager,
    ) -> Result<Self, RecognizerError> {
        let path = manager.resolve(ModelKind::Recognizer, config.path.as_deref());
        Self::load(&path, config)
    }
}

impl TextRecognizer for OnnxTextRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<TextRegion>, RecognizerError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(vec![]);
        }

        let input =
            prepare_recognizer_input(image, self.input_width, self.input_height, self.channels);
        let output = self
            .session
            .run(input)?
            .ok_or_else(|| RecognizerError::Output("model produced no output".to_string()))?;

        let (steps, classes) = sequence_layout(&output.shape)?;
        let (text, confidence) = ctc_greedy_decode(&output.data, steps, classes, &self.vocabulary);

        if text.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![TextRegion::whole(text, confidence, width, height)])
    }
}

/// Sequence length and class count of a CTC output shape
fn sequence_layout(shape: &[usize]) -> Result<(usize, usize), RecognizerError> {
    match shape {
        [1, steps, classes] => Ok((*steps, *classes)),
        [steps, 1, classes] => Ok((*steps, *classes)),
        [steps, classes] => Ok((*steps, *classes)),
        _ => Err(RecognizerError::Output(format!(
            "expected a [1, T, C] sequence, got shape {:?}",
            shape
        ))),
    }
}

/// CTC greedy decoding.
///
/// Takes the best class per step, drops blanks (class 0) and repeats, and maps
/// class `i` to `vocabulary[i - 1]`. Rows that are not already probability
/// distributions are softmaxed first. Confidence is the mean best-class
/// probability over emitted characters.
pub fn ctc_greedy_decode(
    scores: &[f32],
    steps: usize,
    classes: usize,
    vocabulary: &[char],
) -> (String, f32) {
    let mut text = String::new();
    let mut probability_sum = 0.0f32;
    let mut emitted = 0usize;
    let mut prev_idx = 0usize;

    if classes == 0 {
        return (text, 0.0);
    }

    for row in scores.chunks_exact(classes).take(steps) {
        let probs = as_distribution(row);

        let (max_idx, max_prob) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        if max_idx > 0 && max_idx != prev_idx {
            if let Some(&ch) = vocabulary.get(max_idx - 1) {
                text.push(ch);
                probability_sum += max_prob;
                emitted += 1;
            }
        }
        prev_idx = max_idx;
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        probability_sum / emitted as f32
    };
    (text, confidence)
}

fn as_distribution(row: &[f32]) -> Vec<f32> {
    let sum: f32 = row.iter().sum();
    let is_distribution = row.iter().all(|&p| (0.0..=1.0).contains(&p)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return row.to_vec();
    }

    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
