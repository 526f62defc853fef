use std::path::Path;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;

use super::normalize::NormalizedTensor;
use super::{Classifier, InferenceError, InputShape, ModelLoadError, RawPrediction};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX model with its NHWC input pinned at load time, so every request runs
/// against an already optimized plan.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    input: InputShape,
}

impl OnnxClassifier {
    pub fn load(path: &Path, input: InputShape) -> Result<Self, ModelLoadError> {
        log::info!("Loading ONNX model from {}", path.display());
        let load_error = |reason: String| ModelLoadError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| load_error(format!("{e:#}")))?;

        match declared_input(&model).map_err(|e| load_error(format!("{e:#}")))? {
            Some(declared) => check_declared_input(&declared, input).map_err(load_error)?,
            None => log::warn!(
                "Model {} does not declare an input shape, using {:?}",
                path.display(),
                input.dims()
            ),
        }

        let InputShape {
            height,
            width,
            channels,
        } = input;
        let plan = model
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, height, width, channels)),
            )
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| load_error(format!("{e:#}")))?;

        log::info!("Model {} loaded with input {:?}", path.display(), input.dims());
        Ok(Self { plan, input })
    }
}

/// Dimensions of the first graph input as exported. `None` entries are
/// symbolic; `None` overall means the rank itself is unknown.
fn declared_input(model: &InferenceModel) -> TractResult<Option<Vec<Option<usize>>>> {
    let shape = &model.input_fact(0)?.shape;
    if shape.is_open() {
        return Ok(None);
    }
    Ok(Some(
        shape
            .dims()
            .map(|dim| {
                dim.concretize()
                    .and_then(|d| d.as_i64())
                    .and_then(|d| usize::try_from(d).ok())
            })
            .collect(),
    ))
}

/// Every concrete dimension the model declares must agree with the configured
/// NHWC shape. Symbolic ones, usually the batch, are taken from config.
fn check_declared_input(declared: &[Option<usize>], configured: InputShape) -> Result<(), String> {
    let expected = configured.dims();
    let agrees = declared.len() == expected.len()
        && declared
            .iter()
            .zip(expected)
            .all(|(dim, want)| dim.is_none_or(|d| d == want));
    if agrees {
        return Ok(());
    }

    let rendered: Vec<String> = declared
        .iter()
        .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
        .collect();
    Err(format!(
        "model declares input {} but {}x{}x{}x{} is configured",
        rendered.join("x"),
        expected[0],
        expected[1],
        expected[2],
        expected[3]
    ))
}

impl Classifier for OnnxClassifier {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn predict(&self, tensor: &NormalizedTensor) -> Result<RawPrediction, InferenceError> {
        super::ensure_shape(self.input, tensor)?;
        let data = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::Backend("input tensor is not contiguous".into()))?;

        let input = Tensor::from_shape(&self.input.dims(), data)
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Backend(format!("{e:#}")))?;

        let output = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let scores = output
            .as_slice::<f32>()
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        log::debug!("Raw prediction output: {:?}", scores);
        super::first_score(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::normalize::normalize_image;
    use image::{DynamicImage, GrayImage, Luma};
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn uniform(shape: InputShape, value: u8) -> NormalizedTensor {
        let (w, h) = (shape.width as u32, shape.height as u32);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([value])));
        normalize_image(&image, shape).unwrap()
    }

    #[test]
    fn loads_and_predicts_with_declared_shape() {
        let shape = InputShape::new(64, 64, 1);
        let classifier = OnnxClassifier::load(&fixture("sigmoid_64x64x1.onnx"), shape).unwrap();
        assert_eq!(classifier.input_shape(), shape);

        let white = classifier.predict(&uniform(shape, 255)).unwrap();
        assert!((white.value() - 0.731_058_6).abs() < 1e-5);
        let black = classifier.predict(&uniform(shape, 0)).unwrap();
        assert!((black.value() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn declared_shape_disagreeing_with_config_fails_to_load() {
        let err = OnnxClassifier::load(
            &fixture("sigmoid_64x64x1.onnx"),
            InputShape::new(128, 128, 1),
        )
        .err()
        .unwrap();
        match err {
            ModelLoadError::Load { reason, .. } => {
                assert!(reason.contains("1x64x64x1"), "{reason}");
                assert!(reason.contains("1x128x128x1"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn symbolic_dimensions_take_the_configured_size() {
        let shape = InputShape::new(32, 48, 1);
        let classifier = OnnxClassifier::load(&fixture("sigmoid_dynamic.onnx"), shape).unwrap();
        let score = classifier.predict(&uniform(shape, 0)).unwrap();
        assert!((score.value() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wrongly_shaped_tensor_is_rejected_before_running() {
        let classifier =
            OnnxClassifier::load(&fixture("sigmoid_64x64x1.onnx"), InputShape::new(64, 64, 1))
                .unwrap();
        let err = classifier
            .predict(&uniform(InputShape::new(32, 32, 1), 10))
            .unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));
    }

    #[test]
    fn non_float_output_is_a_backend_error() {
        let shape = InputShape::new(8, 8, 1);
        let classifier = OnnxClassifier::load(&fixture("cast_int32.onnx"), shape).unwrap();
        let err = classifier.predict(&uniform(shape, 255)).unwrap_err();
        assert!(matches!(err, InferenceError::Backend(_)));
    }

    #[test]
    fn garbage_model_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"this is not a protobuf model").unwrap();
        assert!(matches!(
            OnnxClassifier::load(&path, InputShape::new(8, 8, 1)),
            Err(ModelLoadError::Load { .. })
        ));
    }

    #[test]
    fn declared_input_check_only_constrains_concrete_dims() {
        let configured = InputShape::new(224, 224, 3);
        assert!(check_declared_input(&[None, Some(224), Some(224), Some(3)], configured).is_ok());
        assert!(check_declared_input(&[None, None, None, Some(3)], configured).is_ok());

        let err =
            check_declared_input(&[Some(1), Some(224), Some(224), Some(1)], configured).unwrap_err();
        assert_eq!(err, "model declares input 1x224x224x1 but 1x224x224x3 is configured");

        let err = check_declared_input(&[None, Some(3), Some(224), Some(224)], configured);
        assert!(err.is_err());
        let err = check_declared_input(&[Some(1), Some(50176), Some(3)], configured).unwrap_err();
        assert!(err.starts_with("model declares input 1x50176x3"));
    }
}
