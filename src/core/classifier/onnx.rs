//! ONNX classification engine using tract.
//!
//! Expects an ONNX export of a Caffe-style ResNet classifier with a
//! `1x3x224x224` BGR input and a two-class softmax output (the open_nsfw
//! layout). The score is the probability of the second class.

use super::decode::FastDecoder;
use super::traits::Classifier;
use crate::error::ClassifyError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Images are resized to this square before cropping
const RESIZE_TO: u32 = 256;
/// Side of the centre crop fed to the network
const INPUT_SIZE: u32 = 224;
/// Per-channel mean in B, G, R order, on a 0-255 scale
const BGR_MEAN: [f32; 3] = [104.0, 117.0, 123.0];
/// Index of the class whose probability is the score
const SCORE_CLASS: usize = 1;

type RunFn = dyn FnMut(Tensor) -> TractResult<Vec<f32>> + Send;

/// Classifier backed by a tract-optimised ONNX model
pub struct OnnxClassifier {
    run: Box<RunFn>,
}

impl OnnxClassifier {
    /// Load and optimise the model at `path`
    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let load_error = |e: TractError| ClassifyError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let size = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_error)?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(load_error)?
            .into_optimized()
            .map_err(load_error)?
            .into_runnable()
            .map_err(load_error)?;

        tracing::debug!("Loaded classification model {}", path.display());

        Ok(Self {
            run: Box::new(move |input: Tensor| -> TractResult<Vec<f32>> {
                let outputs = plan.run(tvec!(input.into()))?;
                let probabilities = outputs[0].to_array_view::<f32>()?;
                Ok(probabilities.iter().copied().collect())
            }),
        })
    }

    /// A factory that loads a fresh classifier from `path` for each worker
    pub fn factory(path: PathBuf) -> Arc<super::ClassifierFactory> {
        Arc::new(move || {
            OnnxClassifier::load(&path).map(|c| Box::new(c) as Box<dyn Classifier>)
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, image: &[u8]) -> Result<f32, ClassifyError> {
        let decoded = FastDecoder::decode(image)?;
        let input = preprocess(&decoded);

        let probabilities =
            (self.run)(input).map_err(|e| ClassifyError::Inference(e.to_string()))?;

        probabilities.get(SCORE_CLASS).copied().ok_or_else(|| {
            ClassifyError::Inference(format!(
                "expected at least {} outputs, got {}",
                SCORE_CLASS + 1,
                probabilities.len()
            ))
        })
    }
}

/// Resize, centre-crop and normalise an image into a `1x3x224x224` BGR tensor
pub(crate) fn preprocess(image: &DynamicImage) -> Tensor {
    let resized = image
        .resize_exact(RESIZE_TO, RESIZE_TO, FilterType::Triangle)
        .to_rgb8();

    let offset = (RESIZE_TO - INPUT_SIZE) / 2;
    let size = INPUT_SIZE as usize;

    tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
        let pixel = resized.get_pixel(x as u32 + offset, y as u32 + offset);
        // Network channel 0 is blue
        let rgb_index = 2 - channel;
        pixel[rgb_index] as f32 - BGR_MEAN[channel]
    })
    .into()
}
