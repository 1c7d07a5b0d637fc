//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use sentinel_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};

use crate::args::CliArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &CliArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    let paths = &args.paths;
    if let Some(path) = paths.cascade.as_ref() {
        settings.models.cascade = path.clone();
    }
    if let Some(path) = paths.gender_model.as_ref() {
        settings.models.gender = path.clone();
    }
    if let Some(path) = paths.station_model.as_ref() {
        settings.models.station = path.clone();
    }
    if let Some(path) = paths.station_labels.as_ref() {
        settings.models.station_labels = path.clone();
    }
    if let Some(path) = paths.facilities.as_ref() {
        settings.data.facilities = path.clone();
    }
    if let Some(path) = paths.crime_data.as_ref() {
        settings.data.crime = path.clone();
    }

    let detection = &args.detection;
    if let Some(scale) = detection.scale_factor {
        settings.detection.scale_factor = scale;
    }
    if let Some(neighbors) = detection.min_neighbors {
        settings.detection.min_neighbors = neighbors;
    }
    if let Some(size) = detection.min_size {
        settings.detection.min_size = size;
    }
    if let Some(max) = detection.max_dimension {
        settings.detection.max_dimension = max;
    }
    if let Some(side) = detection.gender_input_size {
        settings.gender.input_size = side;
    }
}
