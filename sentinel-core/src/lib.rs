//! Sentinel inference core.
//!
//! Counts faces by gender with a Haar cascade and an ONNX classifier, resolves
//! the nearest police station for a coordinate, measures great-circle distance,
//! and tiers district crime volumes. Everything is loaded once into immutable
//! values that can be shared across threads.

/// Multi-scale Haar cascade evaluation and hit grouping.
pub mod cascade;
/// Shared handle over every loaded model and table.
pub mod context;
/// Crime reference table and alert tiers.
pub mod crime;
/// Per-image face tallies.
pub mod demographics;
/// Face detector seam and detector input preparation.
pub mod detector;
/// Per-request error type.
pub mod error;
/// Police station reference table.
pub mod facility;
/// Gender classifier seam and ONNX implementation.
pub mod gender;
/// Coordinates and haversine distance.
pub mod geo;
/// ONNX model loading and execution.
pub mod model;
/// Face counting pipeline.
pub mod pipeline;
/// Nearest-station resolution.
pub mod resolver;
/// SOS alert composition.
pub mod sos;
/// Station classifier seam, label encoder and ONNX implementation.
pub mod station;

pub use cascade::{CascadeParams, GROUP_EPS, HaarCascade, IntegralImage, group_rectangles};
pub use context::SentinelContext;
pub use crime::{CrimeRecord, CrimeTable, CrimeTier};
pub use demographics::{DemographicCount, FaceCountOutcome, aggregate};
pub use detector::{
    CascadeFaceDetector, FaceDetector, FaceRegion, PreparedImage, prepare_for_detection,
};
pub use error::SentinelError;
pub use facility::{FacilityRecord, FacilityTable, normalize_contact};
pub use gender::{Gender, GenderClassifier, MALE_THRESHOLD, OnnxGenderClassifier};
pub use geo::{Coordinate, EARTH_RADIUS_M, distance_km, haversine_km};
pub use model::OnnxModel;
pub use pipeline::FaceCounter;
pub use resolver::{NearestStation, StationResolver};
pub use sos::{SosAlert, SosRequest, compose_sos_alert, sos_message};
pub use station::{LabelEncoder, OnnxStationClassifier, StationClassifier};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
