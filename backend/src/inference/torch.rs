use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::normalize::NormalizedTensor;
use super::{Classifier, InferenceError, InputShape, ModelLoadError, RawPrediction};

/// TorchScript module exported with an NHWC input and a sigmoid output.
pub struct TorchClassifier {
    model: Mutex<CModule>,
    device: Device,
    input: InputShape,
}

impl TorchClassifier {
    pub fn load(path: &Path, input: InputShape) -> Result<Self, ModelLoadError> {
        let device = Device::cuda_if_available();
        log::info!("Loading TorchScript model from {} on {:?}", path.display(), device);
        let mut module = CModule::load_on_device(path, device).map_err(|e| ModelLoadError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        module.set_eval();
        Ok(Self {
            model: Mutex::new(module),
            device,
            input,
        })
    }
}

impl Classifier for TorchClassifier {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn predict(&self, tensor: &NormalizedTensor) -> Result<RawPrediction, InferenceError> {
        super::ensure_shape(self.input, tensor)?;
        let data = tensor
            .as_slice()
            .ok_or_else(|| InferenceError::Backend("input tensor is not contiguous".into()))?;

        let [n, h, w, c] = self.input.dims().map(|d| d as i64);
        let input = Tensor::from_slice(data)
            .reshape([n, h, w, c])
            .to_device(self.device);

        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| InferenceError::Backend("model lock poisoned".into()))?;
            tch::no_grad(|| model.forward_ts(&[input]))
                .map_err(|e| InferenceError::Backend(e.to_string()))?
        };

        let output_flat = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let scores = Vec::<f32>::try_from(&output_flat)
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        super::first_score(&scores)
    }
}
