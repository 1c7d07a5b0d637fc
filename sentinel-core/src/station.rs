//! Coordinate to station-label classification.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use sentinel_utils::timing_guard;
use tract_onnx::prelude::Tensor;

use crate::error::SentinelError;
use crate::geo::Coordinate;
use crate::model::OnnxModel;

/// Maps a coordinate to a station label.
pub trait StationClassifier: Send + Sync {
    fn predict(&self, coordinate: Coordinate) -> Result<String, SentinelError>;
}

/// Class index to station name mapping, stored as a JSON array in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        anyhow::ensure!(!classes.is_empty(), "label encoder has no classes");
        Ok(Self { classes })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read station labels {}", path.display()))?;
        let classes: Vec<String> = serde_json::from_str(&contents).with_context(|| {
            format!(
                "station labels at {} must be a JSON array of strings",
                path.display()
            )
        })?;
        Self::new(classes).with_context(|| format!("invalid station labels {}", path.display()))
    }

    /// Decode a class index back into its name.
    pub fn inverse_transform(&self, index: i64) -> Result<&str, SentinelError> {
        usize::try_from(index)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
            .ok_or_else(|| {
                SentinelError::StationNotFound(format!(
                    "class index {index} outside 0..{}",
                    self.classes.len()
                ))
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// What the classifier graph emitted for the single input row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Prediction {
    Index(i64),
    Label(String),
}

/// Station classifier exported to ONNX, fed `[[latitude, longitude]]` as `f32`.
#[derive(Debug)]
pub struct OnnxStationClassifier {
    model: OnnxModel,
    labels: LabelEncoder,
}

impl OnnxStationClassifier {
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, labels_path: Q) -> Result<Self> {
        let labels = LabelEncoder::from_path(labels_path)?;
        let model = OnnxModel::load(model_path, Some(&[1, 2]), "station")?;
        debug!("station classifier ready with {} classes", labels.len());
        Ok(Self { model, labels })
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }
}

impl StationClassifier for OnnxStationClassifier {
    fn predict(&self, coordinate: Coordinate) -> Result<String, SentinelError> {
        let _guard = timing_guard("sentinel_core::station::predict", log::Level::Debug);
        let features = [coordinate.latitude() as f32, coordinate.longitude() as f32];
        let input = Tensor::from_shape(&[1, 2], &features)
            .map_err(|e| SentinelError::StationNotFound(format!("bad input tensor: {e}")))?;
        let outputs = self
            .model
            .run(input)
            .map_err(|e| SentinelError::StationNotFound(format!("{e:#}")))?;
        match read_prediction(&outputs)? {
            Prediction::Index(index) => self.labels.inverse_transform(index).map(str::to_owned),
            Prediction::Label(label) => Ok(label),
        }
    }
}

/// Prefer an explicit label output; fall back to scores.
///
/// Integer and string outputs are labels. Otherwise the first `f32` output is
/// treated as per-class scores (argmax) or, with a single value, a regressed index.
pub(crate) fn read_prediction(outputs: &[Tensor]) -> Result<Prediction, SentinelError> {
    for output in outputs {
        if let Ok(values) = output.as_slice::<i64>() {
            if let Some(&index) = values.first() {
                return Ok(Prediction::Index(index));
            }
        }
        if let Ok(values) = output.as_slice::<i32>() {
            if let Some(&index) = values.first() {
                return Ok(Prediction::Index(i64::from(index)));
            }
        }
        if let Ok(values) = output.as_slice::<String>() {
            if let Some(label) = values.first() {
                return Ok(Prediction::Label(label.clone()));
            }
        }
    }

    let scores = outputs
        .iter()
        .find_map(|output| output.as_slice::<f32>().ok())
        .ok_or_else(|| {
            SentinelError::StationNotFound("classifier produced no usable output".into())
        })?;
    match scores {
        [] => Err(SentinelError::StationNotFound(
            "classifier output is empty".into(),
        )),
        [single] if single.is_finite() => Ok(Prediction::Index(single.round() as i64)),
        [_] => Err(SentinelError::StationNotFound(
            "classifier output is not finite".into(),
        )),
        many => many
            .iter()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .fold(None, |best: Option<(usize, f32)>, (idx, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((idx, score)),
            })
            .map(|(idx, _)| Prediction::Index(idx as i64))
            .ok_or_else(|| SentinelError::StationNotFound("all class scores are NaN".into())),
    }
}
