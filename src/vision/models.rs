//! Model management for ONNX Runtime
//!
//! Resolves model file locations and wraps ONNX Runtime sessions for the
//! plate locator and the text recognizer.

use anyhow::Result;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use tracing::info;

/// Model file identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// CTC text recognition model
    Recognizer,
    /// Plate bounding-box regressor
    Locator,
}

impl ModelKind {
    /// Default filename inside the models directory
    pub fn filename(&self) -> &'static str {
        match self {
            ModelKind::Recognizer => "plate_recognizer.onnx",
            ModelKind::Locator => "plate_locator.onnx",
        }
    }

    /// Display name for logging
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Recognizer => "Text Recognizer",
            ModelKind::Locator => "Plate Locator",
        }
    }
}

/// Resolves model paths against a models directory
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager for the per-user data directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            models_dir: crate::storage::models_dir()?,
        })
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of a model: absolute configured paths are used as-is, relative ones
    /// are joined to the models directory, and no path means the default filename
    pub fn resolve(&self, kind: ModelKind, configured: Option<&Path>) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.models_dir.join(path),
            None => self.models_dir.join(kind.filename()),
        }
    }

    /// Check if a model file exists
    pub fn is_model_available(&self, kind: ModelKind, configured: Option<&Path>) -> bool {
        self.resolve(kind, configured).is_file()
    }
}

/// First output tensor of a model run, copied out of the session
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, ort::Error> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads.max(1))?
            .commit_from_file(model_path)?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            output_names,
        })
    }

    /// Run the model on a single NCHW input and return its first output.
    /// `None` when the model produced no output tensor.
    pub fn run(&mut self, input: Array4<f32>) -> Result<Option<ModelOutput>, ort::Error> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![tensor])?;

        let Some(value) = self
            .output_names
            .first()
            .and_then(|name| outputs.get(name.as_str()))
        else {
            return Ok(None);
        };

        let (shape, data) = value.try_extract_tensor::<f32>()?;
        Ok(Some(ModelOutput {
            shape: shape.as_ref().iter().map(|&d| d.max(0) as usize).collect(),
            data: data.to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_filenames() {
        assert_eq!(ModelKind::Recognizer.filename(), "plate_recognizer.onnx");
        assert_eq!(ModelKind::Locator.filename(), "plate_locator.onnx");
    }

    #[test]
    fn test_resolve_paths() {
        let manager = ModelManager::with_dir(PathBuf::from("/data/models"));

        assert_eq!(
            manager.resolve(ModelKind::Locator, None),
            PathBuf::from("/data/models/plate_locator.onnx")
        );
        assert_eq!(
            manager.resolve(ModelKind::Recognizer, Some(Path::new("crnn.onnx"))),
            PathBuf::from("/data/models/crnn.onnx")
        );
        assert_eq!(
            manager.resolve(ModelKind::Recognizer, Some(Path::new("/opt/crnn.onnx"))),
            PathBuf::from("/opt/crnn.onnx")
        );
    }

    #[test]
    fn test_model_availability() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf());
        assert!(!manager.is_model_available(ModelKind::Locator, None));

        std::fs::write(dir.path().join("plate_locator.onnx"), b"onnx").unwrap();
        assert!(manager.is_model_available(ModelKind::Locator, None));
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        assert!(OnnxSession::new(Path::new("/nonexistent/model.onnx"), 1).is_err());
    }
}
