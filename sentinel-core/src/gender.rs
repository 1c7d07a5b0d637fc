use std::path::Path;

use anyhow::Result;
use image::RgbImage;
use serde::Serialize;
use sentinel_utils::{config::GenderSettings, resize_exact, rgb_to_bgr_nhwc, timing_guard};
use tract_onnx::prelude::Tensor;

use crate::error::SentinelError;
use crate::model::OnnxModel;

/// Scores strictly above this are classified as male.
pub const MALE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// `score > 0.5` is male; exactly 0.5 counts as female.
    pub fn from_score(score: f32) -> Self {
        if score > MALE_THRESHOLD {
            Self::Male
        } else {
            Self::Female
        }
    }
}

/// Produces a scalar gender score for a cropped face.
pub trait GenderClassifier: Send + Sync {
    fn score(&self, face: &RgbImage) -> Result<f32, SentinelError>;

    fn classify(&self, face: &RgbImage) -> Result<Gender, SentinelError> {
        self.score(face).map(Gender::from_score)
    }
}

/// Gender network served through tract.
///
/// Faces are stretched to `input_size` x `input_size`, laid out as a BGR NHWC
/// batch of one, and fed as raw `0..=255` floats.
#[derive(Debug)]
pub struct OnnxGenderClassifier {
    model: OnnxModel,
    input_size: u32,
}

impl OnnxGenderClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P, settings: &GenderSettings) -> Result<Self> {
        anyhow::ensure!(settings.input_size > 0, "gender input_size must be > 0");
        let side = settings.input_size as usize;
        let model = OnnxModel::load(model_path, Some(&[1, side, side, 3]), "gender")?;
        Ok(Self {
            model,
            input_size: settings.input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    fn input_tensor(&self, face: &RgbImage) -> Result<Tensor, SentinelError> {
        face_tensor(face, self.input_size)
    }
}

impl GenderClassifier for OnnxGenderClassifier {
    fn score(&self, face: &RgbImage) -> Result<f32, SentinelError> {
        let _guard = timing_guard("sentinel_core::gender::score", log::Level::Trace);
        let input = self.input_tensor(face)?;
        let outputs = self
            .model
            .run(input)
            .map_err(|e| SentinelError::ModelInference(format!("{e:#}")))?;
        read_score(&outputs)
    }
}

/// Resize a face crop and lay it out as the network input.
pub(crate) fn face_tensor(face: &RgbImage, side: u32) -> Result<Tensor, SentinelError> {
    if face.width() == 0 || face.height() == 0 {
        return Err(SentinelError::InvalidImage("empty face crop".into()));
    }
    let resized = resize_exact(face, side, side);
    let array = rgb_to_bgr_nhwc(&resized);
    let shape = array.shape().to_vec();
    let data = array
        .as_slice()
        .ok_or_else(|| SentinelError::ModelInference("input tensor is not contiguous".into()))?;
    Tensor::from_shape(&shape, data)
        .map_err(|e| SentinelError::ModelInference(format!("failed to build input tensor: {e}")))
}

/// Pull the score out of the first output, expected to be `[1, 1]` or `[1]`.
pub(crate) fn read_score(outputs: &[Tensor]) -> Result<f32, SentinelError> {
    let output = outputs
        .first()
        .ok_or_else(|| SentinelError::ModelInference("gender model produced no outputs".into()))?;
    if output.rank() == 0 || output.rank() > 2 {
        return Err(SentinelError::ModelInference(format!(
            "unexpected gender output shape {:?}",
            output.shape()
        )));
    }
    let values = output.as_slice::<f32>().map_err(|_| {
        SentinelError::ModelInference(format!(
            "gender output has type {:?}, expected f32",
            output.datum_type()
        ))
    })?;
    let score = *values
        .first()
        .ok_or_else(|| SentinelError::ModelInference("gender output is empty".into()))?;
    if !score.is_finite() {
        return Err(SentinelError::ModelInference(format!(
            "gender score is not finite ({score})"
        )));
    }
    Ok(score)
}
