use anyhow::{Context, Result};
use log::info;
use sentinel_utils::{config::AppSettings, timing_guard};

use crate::crime::{CrimeTable, CrimeTier};
use crate::demographics::FaceCountOutcome;
use crate::error::SentinelError;
use crate::geo::Coordinate;
use crate::pipeline::FaceCounter;
use crate::resolver::{NearestStation, StationResolver};
use crate::sos::{SosAlert, SosRequest, compose_sos_alert};

/// Every model and table, loaded once and shared read-only by all requests.
pub struct SentinelContext {
    faces: FaceCounter,
    stations: StationResolver,
    crime: CrimeTable,
}

impl SentinelContext {
    pub fn new(faces: FaceCounter, stations: StationResolver, crime: CrimeTable) -> Self {
        Self {
            faces,
            stations,
            crime,
        }
    }

    /// Load models and reference tables from the paths in `settings`.
    pub fn load(settings: &AppSettings) -> Result<Self> {
        let _guard = timing_guard("sentinel_core::context::load", log::Level::Info);
        let faces = FaceCounter::from_settings(settings).context("failed to load face pipeline")?;
        let stations =
            StationResolver::from_settings(settings).context("failed to load station resolver")?;
        let crime = CrimeTable::from_path(&settings.data.crime)?;
        info!(
            "context ready: {} facilities, {} crime regions",
            stations.facilities().len(),
            crime.len()
        );
        Ok(Self::new(faces, stations, crime))
    }

    pub fn faces(&self) -> &FaceCounter {
        &self.faces
    }

    pub fn stations(&self) -> &StationResolver {
        &self.stations
    }

    pub fn crime(&self) -> &CrimeTable {
        &self.crime
    }

    pub fn count_faces_by_gender(&self, bytes: &[u8]) -> Result<FaceCountOutcome, SentinelError> {
        self.faces.count_faces_in_bytes(bytes)
    }

    pub fn resolve_nearest_station(
        &self,
        coordinate: Coordinate,
    ) -> Result<NearestStation, SentinelError> {
        self.stations.resolve_nearest_station(coordinate)
    }

    pub fn distance_to_nearest_station(&self, coordinate: Coordinate) -> Result<f64, SentinelError> {
        self.stations.distance_to_nearest_station(coordinate)
    }

    pub fn crime_alert_for_region(&self, region: &str) -> CrimeTier {
        self.crime.alert_for_region(region)
    }

    pub fn compose_sos_alert(&self, request: &SosRequest) -> Result<SosAlert, SentinelError> {
        compose_sos_alert(request, Some(&self.stations))
    }
}
