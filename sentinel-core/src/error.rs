use thiserror::Error;

/// Failures of a single core invocation.
///
/// Every variant is terminal for the request that produced it; nothing in the
/// core retries. An image without faces is not an error, see
/// [`crate::FaceCountOutcome::NoFaces`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SentinelError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("nearest station not found: {0}")]
    StationNotFound(String),

    #[error("no facility matches '{0}'")]
    FacilityNotFound(String),
}

impl SentinelError {
    /// Stable machine-readable tag for boundary layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::ModelInference(_) => "model_inference_error",
            Self::InvalidCoordinates { .. } => "invalid_coordinates",
            Self::StationNotFound(_) => "station_not_found",
            Self::FacilityNotFound(_) => "facility_not_found",
        }
    }
}
