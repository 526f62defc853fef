pub mod decision;
pub mod normalize;
pub mod onnx;
#[cfg(feature = "torch")]
pub mod torch;

use serde::{Deserialize, Serialize};
use shared::ScanType;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{BackendKind, ModelConfig};
use decision::DiagnosisResult;
use normalize::{NormalizeError, NormalizedTensor};

/// Spatial input a model was exported with, batch dimension excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// NHWC dimensions with a batch of one.
    pub fn dims(&self) -> [usize; 4] {
        [1, self.height, self.width, self.channels]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Input tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },
    #[error("Model produced an empty output")]
    EmptyOutput,
    #[error("Model score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),
    #[error("Model error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model not found at: {0}")]
    Missing(PathBuf),
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("The {0} backend is not compiled into this build")]
    BackendUnavailable(&'static str),
}

/// Output scalar of a binary classifier, guaranteed to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrediction(f64);

impl RawPrediction {
    pub fn new(score: f64) -> Result<Self, InferenceError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(InferenceError::ScoreOutOfRange(score));
        }
        Ok(Self(score))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// A loaded model that maps one normalized image to one probability.
///
/// Implementations are shared across request handlers, so `predict` must not
/// mutate model state.
pub trait Classifier: Send + Sync {
    fn input_shape(&self) -> InputShape;

    fn predict(&self, tensor: &NormalizedTensor) -> Result<RawPrediction, InferenceError>;
}

pub(crate) fn ensure_shape(
    expected: InputShape,
    tensor: &NormalizedTensor,
) -> Result<(), InferenceError> {
    let actual = tensor.shape();
    if actual != expected.dims() {
        return Err(InferenceError::ShapeMismatch {
            expected: expected.dims(),
            actual,
        });
    }
    Ok(())
}

/// Batch size is one, so the first element of the flattened output is the score.
pub(crate) fn first_score(output: &[f32]) -> Result<RawPrediction, InferenceError> {
    let score = output.first().ok_or(InferenceError::EmptyOutput)?;
    RawPrediction::new(f64::from(*score))
}

pub fn load_classifier(model: &ModelConfig) -> Result<Arc<dyn Classifier>, ModelLoadError> {
    if !model.path.exists() {
        return Err(ModelLoadError::Missing(model.path.clone()));
    }

    match model.backend {
        BackendKind::Onnx => Ok(Arc::new(onnx::OnnxClassifier::load(
            &model.path,
            model.input,
        )?)),
        #[cfg(feature = "torch")]
        BackendKind::Torch => Ok(Arc::new(torch::TorchClassifier::load(
            &model.path,
            model.input,
        )?)),
        #[cfg(not(feature = "torch"))]
        BackendKind::Torch => Err(ModelLoadError::BackendUnavailable("torch")),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Normalizes the image stored at `image_path`, runs it through `classifier`
/// and maps the score with the polarity of `scan`.
pub fn diagnose(
    scan: ScanType,
    classifier: &dyn Classifier,
    image_path: &Path,
) -> Result<DiagnosisResult, DiagnosisError> {
    log::info!("Processing {} image {}", scan.analysis_name(), image_path.display());

    let tensor = normalize::normalize_file(image_path, classifier.input_shape())?;
    log::debug!("Final preprocessed shape: {:?}", tensor.shape());

    let raw = classifier.predict(&tensor)?;
    log::info!("Raw {} prediction value: {}", scan, raw.value());

    let result = decision::decide(scan, raw);
    log::info!(
        "Final results - label: {}, confidence: {:.2}%",
        result.label,
        result.confidence
    );
    Ok(result)
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Returns a fixed score for any correctly shaped input.
    pub struct StubClassifier {
        pub shape: InputShape,
        pub score: f64,
    }

    impl Classifier for StubClassifier {
        fn input_shape(&self) -> InputShape {
            self.shape
        }

        fn predict(&self, tensor: &NormalizedTensor) -> Result<RawPrediction, InferenceError> {
            ensure_shape(self.shape, tensor)?;
            RawPrediction::new(self.score)
        }
    }

    pub struct FailingClassifier {
        pub shape: InputShape,
    }

    impl Classifier for FailingClassifier {
        fn input_shape(&self) -> InputShape {
            self.shape
        }

        fn predict(&self, _tensor: &NormalizedTensor) -> Result<RawPrediction, InferenceError> {
            Err(InferenceError::Backend("numeric failure".into()))
        }
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, image::ImageFormat::Png)
    }

    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, image::ImageFormat::Jpeg)
    }

    fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
        let image = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }
}
