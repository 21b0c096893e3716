//! Learned plate locator
//!
//! A bounding-box regressor that predicts one plate box per image. When its
//! box is large enough the engine trusts it over the heuristic ensemble.

use image::RgbImage;
use std::path::Path;
use tracing::{info, warn};

use super::models::{ModelKind, ModelManager, OnnxSession};
use super::preprocess::prepare_locator_input;
use crate::config::ModelConfig;
use crate::error::LocatorError;

/// Plate bounding-box regressor
pub trait PlateLocator: Send {
    /// Predict normalized `(x1, y1, x2, y2)`; values outside [0, 1] are clamped by the caller
    fn locate(&mut self, image: &RgbImage) -> Result<[f32; 4], LocatorError>;
}

impl<F> PlateLocator for F
where
    F: FnMut(&RgbImage) -> Result<[f32; 4], LocatorError> + Send,
{
    fn locate(&mut self, image: &RgbImage) -> Result<[f32; 4], LocatorError> {
        self(image)
    }
}

/// ONNX regressor taking a `[1, 3, S, S]` 0-1 RGB input and producing 4 floats
pub struct OnnxPlateLocator {
    session: OnnxSession,
    input_size: u32,
}

impl OnnxPlateLocator {
    pub fn load(path: &Path, input_size: u32, intra_threads: usize) -> Result<Self, LocatorError> {
        let session =
            OnnxSession::new(path, intra_threads).map_err(|source| LocatorError::Load {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "{} ready ({}x{} input)",
            ModelKind::Locator.display_name(),
            input_size,
            input_size
        );

        Ok(Self {
            session,
            input_size,
        })
    }
}

impl PlateLocator for OnnxPlateLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<[f32; 4], LocatorError> {
        let input = prepare_locator_input(image, self.input_size);
        let output = self
            .session
            .run(input)?
            .ok_or_else(|| LocatorError::Output("model produced no output".to_string()))?;

        match output.data.as_slice() {
            [x1, y1, x2, y2, ..] => Ok([*x1, *y1, *x2, *y2]),
            other => Err(LocatorError::Output(format!(
                "expected 4 values, got {}",
                other.len()
            ))),
        }
    }
}

/// Load the configured locator, if enabled and present.
///
/// A missing or unloadable model is logged and yields `None`; the engine then
/// relies on the heuristic ensemble alone.
pub fn load_locator(
    config: &ModelConfig,
    manager: &ModelManager,
    intra_threads: usize,
) -> Option<Box<dyn PlateLocator>> {
    if !config.use_locator {
        return None;
    }

    let configured = config.locator_path.as_deref();
    let path = manager.resolve(ModelKind::Locator, configured);
    if !manager.is_model_available(ModelKind::Locator, configured) {
        info!("No plate locator at {:?}, using heuristic detection", path);
        return None;
    }

    match OnnxPlateLocator::load(&path, config.locator_input_size, intra_threads) {
        Ok(locator) => Some(Box::new(locator)),
        Err(e) => {
            warn!("Failed to load plate locator, using heuristic detection: {}", e);
            None
        }
    }
}
