use anyhow::Result;
use log::{debug, info};
use serde::Serialize;
use sentinel_utils::{config::AppSettings, timing_guard};

use crate::error::SentinelError;
use crate::facility::{FacilityRecord, FacilityTable};
use crate::geo::{Coordinate, distance_km};
use crate::station::{OnnxStationClassifier, StationClassifier};

/// Classifier label together with the facility it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestStation {
    pub label: String,
    pub facility: FacilityRecord,
}

/// Coordinate to nearest police station, via classifier and facility table.
pub struct StationResolver {
    classifier: Box<dyn StationClassifier>,
    facilities: FacilityTable,
}

impl StationResolver {
    pub fn new(classifier: Box<dyn StationClassifier>, facilities: FacilityTable) -> Self {
        Self {
            classifier,
            facilities,
        }
    }

    /// Load the station model, its labels and the facility table named in `settings`.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let classifier =
            OnnxStationClassifier::load(&settings.models.station, &settings.models.station_labels)?;
        let facilities = FacilityTable::from_path(&settings.data.facilities)?;
        Ok(Self::new(Box::new(classifier), facilities))
    }

    pub fn facilities(&self) -> &FacilityTable {
        &self.facilities
    }

    /// Predict the station label for `coordinate` and look up its record.
    ///
    /// Every failure, including a label missing from the table, surfaces as
    /// `StationNotFound`.
    pub fn resolve_nearest_station(
        &self,
        coordinate: Coordinate,
    ) -> Result<NearestStation, SentinelError> {
        let _guard = timing_guard("sentinel_core::resolve_nearest_station", log::Level::Debug);
        let label = self
            .classifier
            .predict(coordinate)
            .map_err(|err| match err {
                SentinelError::StationNotFound(_) => err,
                other => SentinelError::StationNotFound(other.to_string()),
            })?;
        debug!(
            "({}, {}) classified as '{label}'",
            coordinate.latitude(),
            coordinate.longitude()
        );

        let facility = self.facilities.lookup(&label).map_err(|_| {
            SentinelError::StationNotFound(format!("label '{label}' has no facility record"))
        })?;
        info!("nearest station: {}", facility.name);
        Ok(NearestStation {
            label,
            facility: facility.clone(),
        })
    }

    /// Validate raw degrees, then resolve.
    pub fn resolve_at(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<NearestStation, SentinelError> {
        self.resolve_nearest_station(Coordinate::new(latitude, longitude)?)
    }

    /// Kilometres (two decimals) from `coordinate` to its nearest station.
    pub fn distance_to_nearest_station(&self, coordinate: Coordinate) -> Result<f64, SentinelError> {
        self.nearest_with_distance(coordinate)
            .map(|(_, distance)| distance)
    }

    /// Resolve once and measure the distance to the result.
    pub fn nearest_with_distance(
        &self,
        coordinate: Coordinate,
    ) -> Result<(NearestStation, f64), SentinelError> {
        let station = self.resolve_nearest_station(coordinate)?;
        let target = station.facility.coordinate().map_err(|_| {
            SentinelError::StationNotFound(format!(
                "facility '{}' has invalid coordinates",
                station.facility.name
            ))
        })?;
        let distance = distance_km(coordinate, target);
        debug!("distance to {}: {distance} km", station.facility.name);
        Ok((station, distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLabel(&'static str);

    impl StationClassifier for FixedLabel {
        fn predict(&self, _coordinate: Coordinate) -> Result<String, SentinelError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl StationClassifier for Failing {
        fn predict(&self, _coordinate: Coordinate) -> Result<String, SentinelError> {
            Err(SentinelError::ModelInference("graph exploded".into()))
        }
    }

    fn facilities() -> FacilityTable {
        FacilityTable::from_records(vec![
            FacilityRecord {
                name: "Kotwali Nagar".into(),
                contact_number: "05222621234".into(),
                latitude: 26.85,
                longitude: 80.91,
            },
            FacilityRecord {
                name: "Bad Coordinates Thana".into(),
                contact_number: "100".into(),
                latitude: 999.0,
                longitude: 0.0,
            },
        ])
    }

    fn lucknow() -> Coordinate {
        Coordinate::new(26.8467, 80.9462).unwrap()
    }

    #[test]
    fn resolves_label_to_facility() {
        let resolver = StationResolver::new(Box::new(FixedLabel("KOTWALI")), facilities());
        let station = resolver.resolve_nearest_station(lucknow()).unwrap();
        assert_eq!(station.label, "KOTWALI");
        assert_eq!(station.facility.name, "Kotwali Nagar");
        assert_eq!(station.facility.contact_number, "05222621234");
    }

    #[test]
    fn unknown_label_is_station_not_found() {
        let resolver = StationResolver::new(Box::new(FixedLabel("Gomti Nagar")), facilities());
        let err = resolver.resolve_nearest_station(lucknow()).unwrap_err();
        assert_eq!(err.kind(), "station_not_found");
        assert!(err.to_string().contains("Gomti Nagar"));
    }

    #[test]
    fn classifier_failures_become_station_not_found() {
        let resolver = StationResolver::new(Box::new(Failing), facilities());
        let err = resolver.resolve_nearest_station(lucknow()).unwrap_err();
        assert_eq!(err.kind(), "station_not_found");
        assert!(err.to_string().contains("graph exploded"));
    }

    #[test]
    fn invalid_input_coordinates_are_rejected_before_prediction() {
        let resolver = StationResolver::new(Box::new(Failing), facilities());
        let err = resolver.resolve_at(91.0, 0.0).unwrap_err();
        assert_eq!(err.kind(), "invalid_coordinates");
    }

    #[test]
    fn distance_is_rounded_kilometres() {
        let resolver = StationResolver::new(Box::new(FixedLabel("kotwali")), facilities());
        let distance = resolver.distance_to_nearest_station(lucknow()).unwrap();
        let expected = distance_km(lucknow(), Coordinate::new(26.85, 80.91).unwrap());
        assert_eq!(distance, expected);
        assert!(distance > 3.0 && distance < 4.5, "{distance}");
    }

    #[test]
    fn facility_with_broken_coordinates_cannot_be_measured() {
        let resolver = StationResolver::new(Box::new(FixedLabel("bad coord")), facilities());
        let err = resolver.distance_to_nearest_station(lucknow()).unwrap_err();
        assert_eq!(err.kind(), "station_not_found");
    }
}
