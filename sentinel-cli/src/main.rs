mod args;
mod config;
mod input;
mod output;

use std::{path::Path, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rayon::prelude::*;
use sentinel_core::{
    Coordinate, CrimeTable, FaceCounter, SosRequest, StationResolver, compose_sos_alert,
};
use sentinel_utils::{config::AppSettings, init_logging, normalize_path, timing_guard};

use crate::{
    args::{CliArgs, Command, CoordinateArgs, SosArgs},
    config::{apply_cli_overrides, load_settings},
    input::collect_images,
    output::{
        CrimeAlertRecord, DistanceRecord, ErrorRecord, FaceCountRecord, ImageFaceCount, SosRecord,
        StationRecord, emit,
    },
};

/// Exit status when a request was answered with an error record.
const REQUEST_FAILED: u8 = 2;

fn main() -> Result<ExitCode> {
    init_logging(log::LevelFilter::Info)?;
    let args = CliArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    settings
        .detection
        .validate()
        .context("invalid detection settings")?;
    settings.telemetry.apply();

    let json = args.json.as_deref();
    match &args.command {
        Command::Faces { input } => run_faces(&settings, input, json),
        Command::Station(coordinate) => run_station(&settings, *coordinate, json),
        Command::Distance(coordinate) => run_distance(&settings, *coordinate, json),
        Command::Crime { region } => run_crime(&settings, region, json),
        Command::Sos(sos) => run_sos(&settings, sos, json),
    }
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::from(REQUEST_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_faces(settings: &AppSettings, input: &Path, json: Option<&Path>) -> Result<ExitCode> {
    let input_path = normalize_path(input)?;
    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: jpg, jpeg, png, bmp, webp)",
            input_path.display()
        );
    }

    info!(
        "Loading cascade {} and gender model {}",
        settings.models.cascade.display(),
        settings.models.gender.display()
    );
    let counter = FaceCounter::from_settings(settings)?;

    info!("Processing {} image(s)...", images.len());
    let _guard = timing_guard("sentinel_cli::faces", log::Level::Info);
    let results: Vec<ImageFaceCount> = images
        .par_iter()
        .map(|image_path| {
            let result = FaceCountRecord::from(counter.count_faces_in_file(image_path));
            if let FaceCountRecord::Failed(err) = &result {
                warn!("Failed to process {}: {}", image_path.display(), err.error);
            }
            ImageFaceCount {
                image: image_path.display().to_string(),
                result,
            }
        })
        .collect();

    emit(&results, json)?;
    Ok(exit_code(results.iter().all(|r| r.result.is_failure())))
}

fn run_station(
    settings: &AppSettings,
    coordinate: CoordinateArgs,
    json: Option<&Path>,
) -> Result<ExitCode> {
    let coordinate = match Coordinate::new(coordinate.latitude, coordinate.longitude) {
        Ok(coordinate) => coordinate,
        Err(err) => {
            emit(&ErrorRecord::from(&err), json)?;
            return Ok(exit_code(true));
        }
    };
    let resolver = StationResolver::from_settings(settings)?;
    let record = StationRecord::from(resolver.resolve_nearest_station(coordinate));
    let failed = matches!(record, StationRecord::Failed(_));
    emit(&record, json)?;
    Ok(exit_code(failed))
}

fn run_distance(
    settings: &AppSettings,
    coordinate: CoordinateArgs,
    json: Option<&Path>,
) -> Result<ExitCode> {
    let coordinate = match Coordinate::new(coordinate.latitude, coordinate.longitude) {
        Ok(coordinate) => coordinate,
        Err(err) => {
            emit(&ErrorRecord::from(&err), json)?;
            return Ok(exit_code(true));
        }
    };
    let resolver = StationResolver::from_settings(settings)?;
    let record = DistanceRecord::from(resolver.distance_to_nearest_station(coordinate));
    let failed = matches!(record, DistanceRecord::Failed(_));
    emit(&record, json)?;
    Ok(exit_code(failed))
}

fn run_crime(settings: &AppSettings, region: &str, json: Option<&Path>) -> Result<ExitCode> {
    let table = CrimeTable::from_path(&settings.data.crime)?;
    let tier = table.alert_for_region(region);
    info!("Crime alert for '{region}': {tier}");
    emit(&CrimeAlertRecord::new(region, tier), json)?;
    Ok(ExitCode::SUCCESS)
}

fn run_sos(settings: &AppSettings, sos: &SosArgs, json: Option<&Path>) -> Result<ExitCode> {
    let request = SosRequest {
        username: sos.username.clone(),
        mobile: sos.mobile.clone(),
        address: sos.address.clone(),
        latitude: sos.coordinate.latitude,
        longitude: sos.coordinate.longitude,
    };

    let resolver = if sos.no_station {
        None
    } else {
        match StationResolver::from_settings(settings) {
            Ok(resolver) => Some(resolver),
            Err(err) => {
                warn!("Station lookup unavailable, sending SOS without it: {err:#}");
                None
            }
        }
    };

    let record = SosRecord::from(compose_sos_alert(&request, resolver.as_ref()));
    let failed = matches!(record, SosRecord::Failed(_));
    emit(&record, json)?;
    Ok(exit_code(failed))
}
