//! Command-line argument definitions for sentinel-cli.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run the Sentinel inference core from the command line.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Optional settings JSON. Defaults to `config/sentinel.json` when present, otherwise built-in parameters.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write results to a JSON file instead of stdout.
    #[arg(long, global = true)]
    pub json: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL", global = true)]
    pub telemetry_level: Option<String>,

    #[command(flatten)]
    pub paths: PathOverrides,

    #[command(flatten)]
    pub detection: DetectionOverrides,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Count male and female faces in an image or every image in a directory.
    Faces {
        /// Path to an image file or a directory containing images.
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Resolve the nearest police station and its contact number.
    Station(CoordinateArgs),
    /// Distance in kilometres to the nearest police station.
    Distance(CoordinateArgs),
    /// Crime alert tier for a district.
    Crime {
        /// District or circle name (case-insensitive substring).
        #[arg(short, long)]
        region: String,
    },
    /// Compose an SOS alert for a location.
    Sos(SosArgs),
}

#[derive(Debug, Clone, Copy, Args)]
pub struct CoordinateArgs {
    /// Latitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,
}

#[derive(Debug, Args)]
pub struct SosArgs {
    /// Reporter name (defaults to Guest).
    #[arg(long, default_value = "")]
    pub username: String,

    /// Reporter mobile number.
    #[arg(long)]
    pub mobile: String,

    /// Street address or landmark.
    #[arg(long)]
    pub address: String,

    #[command(flatten)]
    pub coordinate: CoordinateArgs,

    /// Skip the nearest-station lookup.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_station: bool,
}

/// Overrides for model and reference-data locations.
#[derive(Debug, Default, Args)]
pub struct PathOverrides {
    /// Haar cascade XML for face detection.
    #[arg(long, global = true)]
    pub cascade: Option<PathBuf>,

    /// Gender classifier ONNX model.
    #[arg(long, global = true)]
    pub gender_model: Option<PathBuf>,

    /// Station classifier ONNX model.
    #[arg(long, global = true)]
    pub station_model: Option<PathBuf>,

    /// JSON array of station labels in class-index order.
    #[arg(long, global = true)]
    pub station_labels: Option<PathBuf>,

    /// Police station CSV.
    #[arg(long, global = true)]
    pub facilities: Option<PathBuf>,

    /// District crime CSV.
    #[arg(long, global = true)]
    pub crime_data: Option<PathBuf>,
}

/// Overrides for the face detector.
#[derive(Debug, Default, Args)]
pub struct DetectionOverrides {
    /// Window growth factor between scales (> 1.0).
    #[arg(long, global = true)]
    pub scale_factor: Option<f64>,

    /// Neighbouring hits required to keep a face.
    #[arg(long, global = true)]
    pub min_neighbors: Option<u32>,

    /// Smallest face side in pixels.
    #[arg(long, global = true)]
    pub min_size: Option<u32>,

    /// Images larger than this on either side are resized to a square of this size.
    #[arg(long, global = true)]
    pub max_dimension: Option<u32>,

    /// Side of the square crop fed to the gender model.
    #[arg(long, global = true)]
    pub gender_input_size: Option<u32>,
}
