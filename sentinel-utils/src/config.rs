//! Shared configuration types consumed across the Sentinel workspace.
//!
//! Settings are stored as JSON and cover model and reference-data locations,
//! face detection parameters and telemetry. Every section falls back to its
//! defaults when omitted.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Cascade detection parameters.
///
/// The defaults mirror the values the face counter has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Geometric growth factor between successive window sizes.
    pub scale_factor: f64,
    /// Neighbouring raw hits needed before a detection is kept.
    pub min_neighbors: u32,
    /// Smallest window side in pixels.
    pub min_size: u32,
    /// Images with either side larger than this are resized to a
    /// `max_dimension` x `max_dimension` square before detection.
    pub max_dimension: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
            max_dimension: 1024,
        }
    }
}

impl DetectionSettings {
    /// Check that the parameters describe a scan that terminates.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.scale_factor.is_finite() && self.scale_factor > 1.0,
            "scale_factor must be greater than 1.0 (got {})",
            self.scale_factor
        );
        anyhow::ensure!(self.max_dimension > 0, "max_dimension must be > 0");
        Ok(())
    }
}

/// Gender classifier input geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenderSettings {
    /// Side of the square face crop fed to the network.
    pub input_size: u32,
}

impl Default for GenderSettings {
    fn default() -> Self {
        Self { input_size: 64 }
    }
}

/// Locations of the model artefacts loaded at start-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelPaths {
    /// Haar cascade XML for frontal faces.
    pub cascade: PathBuf,
    /// Gender classification network (ONNX).
    pub gender: PathBuf,
    /// Nearest-station classifier (ONNX).
    pub station: PathBuf,
    /// JSON array of station names, in class-index order.
    pub station_labels: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            cascade: PathBuf::from("models/haarcascade_frontalface_default.xml"),
            gender: PathBuf::from("models/gender_classifier.onnx"),
            station: PathBuf::from("models/police_station_classifier.onnx"),
            station_labels: PathBuf::from("models/police_station_labels.json"),
        }
    }
}

/// Locations of the reference tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DataPaths {
    /// Police station CSV (`Police_station_name`, `phone_number`, `latitude`, `longitude`).
    pub facilities: PathBuf,
    /// District crime CSV (`registeration_circles`, `total_crime_against_women`).
    pub crime: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            facilities: PathBuf::from("data/police_stations.csv"),
            crime: PathBuf::from("data/districtwise_crime_against_women.csv"),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    /// Push these settings into the global telemetry switch.
    pub fn apply(&self) {
        crate::telemetry::configure(self.enabled, self.level_filter());
    }
}

/// Persistent settings consumed by the CLI and by embedding services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    /// Model artefact locations.
    pub models: ModelPaths,
    /// Reference table locations.
    pub data: DataPaths,
    /// Face detection parameters.
    pub detection: DetectionSettings,
    /// Gender classifier parameters.
    pub gender: GenderSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file; missing sections use their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings
            .detection
            .validate()
            .with_context(|| format!("invalid detection settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default settings location (`config/sentinel.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/sentinel.json"))
        .unwrap_or_else(|_| PathBuf::from("config/sentinel.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = AppSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection, settings.detection);
        assert_eq!(loaded.models, settings.models);
        assert_eq!(loaded.data, settings.data);
        assert_eq!(loaded.gender, settings.gender);
        assert_eq!(loaded.telemetry.enabled, settings.telemetry.enabled);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "detection": { "min_neighbors": 3 },
            "data": { "crime": "elsewhere/crime.csv" }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.detection.min_neighbors, 3);
        assert_eq!(loaded.detection.scale_factor, 1.1);
        assert_eq!(loaded.detection.min_size, 30);
        assert_eq!(loaded.detection.max_dimension, 1024);
        assert_eq!(loaded.data.crime, PathBuf::from("elsewhere/crime.csv"));
        assert_eq!(loaded.data.facilities, DataPaths::default().facilities);
        assert_eq!(loaded.gender.input_size, 64);
        assert!(!loaded.telemetry.enabled);
        assert_eq!(loaded.telemetry.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn non_growing_scale_factor_is_rejected() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), r#"{ "detection": { "scale_factor": 1.0 } }"#).expect("write");
        assert!(AppSettings::load_from_path(file.path()).is_err());
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "Warning".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);
    }
}
