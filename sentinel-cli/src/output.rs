//! JSON records printed by each subcommand.

use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use sentinel_core::{CrimeTier, FaceCountOutcome, NearestStation, SentinelError, SosAlert};

pub const NO_FACES_MESSAGE: &str = "No faces detected in the image.";

#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub error: String,
    pub kind: &'static str,
}

impl From<&SentinelError> for ErrorRecord {
    fn from(err: &SentinelError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FaceCountRecord {
    Counted {
        num_males: u32,
        num_females: u32,
        total_faces: u32,
    },
    NoFaces {
        message: &'static str,
    },
    Failed(ErrorRecord),
}

impl From<Result<FaceCountOutcome, SentinelError>> for FaceCountRecord {
    fn from(result: Result<FaceCountOutcome, SentinelError>) -> Self {
        match result {
            Ok(FaceCountOutcome::Counted(count)) => Self::Counted {
                num_males: count.male,
                num_females: count.female,
                total_faces: count.total,
            },
            Ok(FaceCountOutcome::NoFaces) => Self::NoFaces {
                message: NO_FACES_MESSAGE,
            },
            Err(err) => Self::Failed(ErrorRecord::from(&err)),
        }
    }
}

impl FaceCountRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ImageFaceCount {
    pub image: String,
    #[serde(flatten)]
    pub result: FaceCountRecord,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StationRecord {
    Found {
        police_station: String,
        contact_number: String,
    },
    Failed(ErrorRecord),
}

impl From<Result<NearestStation, SentinelError>> for StationRecord {
    fn from(result: Result<NearestStation, SentinelError>) -> Self {
        match result {
            Ok(station) => Self::Found {
                police_station: station.label,
                contact_number: station.facility.contact_number,
            },
            Err(err) => Self::Failed(ErrorRecord::from(&err)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DistanceRecord {
    Found { police_distance: f64 },
    Failed(ErrorRecord),
}

impl From<Result<f64, SentinelError>> for DistanceRecord {
    fn from(result: Result<f64, SentinelError>) -> Self {
        match result {
            Ok(police_distance) => Self::Found { police_distance },
            Err(err) => Self::Failed(ErrorRecord::from(&err)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CrimeAlertRecord {
    pub region: String,
    pub alert: CrimeTier,
    pub indicator: &'static str,
}

impl CrimeAlertRecord {
    pub fn new(region: &str, tier: CrimeTier) -> Self {
        Self {
            region: region.to_string(),
            alert: tier,
            indicator: tier.indicator(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SosSent {
    pub status: &'static str,
    #[serde(flatten)]
    pub alert: SosAlert,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SosRecord {
    Sent(SosSent),
    Failed(ErrorRecord),
}

impl From<Result<SosAlert, SentinelError>> for SosRecord {
    fn from(result: Result<SosAlert, SentinelError>) -> Self {
        match result {
            Ok(alert) => Self::Sent(SosSent {
                status: "SOS sent!",
                alert,
            }),
            Err(err) => Self::Failed(ErrorRecord::from(&err)),
        }
    }
}

/// Pretty-print `value` to `json_path`, or to stdout when no path is given.
pub fn emit<T: Serialize>(value: &T, json_path: Option<&Path>) -> Result<()> {
    if let Some(json_path) = json_path {
        if let Some(dir) = json_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, value)
            .with_context(|| format!("failed to write JSON to {}", json_path.display()))?;
        info!("Wrote results to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(value).context("failed to serialize results")?;
        println!("{json}");
    }
    Ok(())
}
