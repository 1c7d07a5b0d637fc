use std::fs;

use sentinel_core::{
    Coordinate, FacilityTable, LabelEncoder, SentinelError, StationClassifier, StationResolver,
    distance_km, haversine_km,
};
use tempfile::tempdir;

const STATIONS_CSV: &str = "\
Police_station_name,phone_number,latitude,longitude
Model Town Police Station,011-2721-1111,28.7159,77.1910
Civil Lines Police Station,011-2381-2222,28.6814,77.2226
Rohini Sector 3 Police Station,011-2705-3333,28.7041,77.1025
Connaught Place Police Station,011-2336-4444,28.6315,77.2167
";

/// Nearest-centroid stand-in for the trained model, emitting encoded labels.
struct NearestCentroid {
    centroids: Vec<(Coordinate, i64)>,
    labels: LabelEncoder,
}

impl StationClassifier for NearestCentroid {
    fn predict(&self, coordinate: Coordinate) -> Result<String, SentinelError> {
        let (_, index) = self
            .centroids
            .iter()
            .map(|(c, idx)| (haversine_km(coordinate, *c), *idx))
            .fold((f64::INFINITY, -1), |best, candidate| {
                if candidate.0 < best.0 { candidate } else { best }
            });
        self.labels.inverse_transform(index).map(str::to_owned)
    }
}

fn resolver() -> StationResolver {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("stations.csv");
    let labels_path = dir.path().join("labels.json");
    fs::write(&csv_path, STATIONS_CSV).unwrap();
    fs::write(
        &labels_path,
        r#"["MODEL TOWN", "CIVIL LINES", "ROHINI SECTOR 3", "CONNAUGHT PLACE"]"#,
    )
    .unwrap();

    let facilities = FacilityTable::from_path(&csv_path).unwrap();
    let labels = LabelEncoder::from_path(&labels_path).unwrap();
    let centroids = facilities
        .records()
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.coordinate().unwrap(), idx as i64))
        .collect();
    StationResolver::new(Box::new(NearestCentroid { centroids, labels }), facilities)
}

#[test]
fn delhi_scenario_resolves_to_matching_facility() {
    let resolver = resolver();
    let delhi = Coordinate::new(28.7041, 77.1025).unwrap();
    let station = resolver.resolve_nearest_station(delhi).unwrap();
    assert_eq!(station.label, "ROHINI SECTOR 3");
    assert!(
        station
            .facility
            .name
            .to_lowercase()
            .contains(&station.label.to_lowercase())
    );
    assert_eq!(station.facility.contact_number, "01127053333");
    assert_eq!(resolver.distance_to_nearest_station(delhi).unwrap(), 0.0);
}

#[test]
fn resolution_is_deterministic() {
    let resolver = resolver();
    let point = Coordinate::new(28.66, 77.21).unwrap();
    let first = resolver.resolve_nearest_station(point).unwrap();
    for _ in 0..5 {
        assert_eq!(resolver.resolve_nearest_station(point).unwrap(), first);
    }
}

#[test]
fn distance_matches_haversine_to_resolved_station() {
    let resolver = resolver();
    let point = Coordinate::new(28.65, 77.23).unwrap();
    let (station, distance) = resolver.nearest_with_distance(point).unwrap();
    let expected = distance_km(point, station.facility.coordinate().unwrap());
    assert_eq!(distance, expected);
    assert_eq!(distance, (distance * 100.0).round() / 100.0);
}

#[test]
fn invalid_coordinates_never_reach_the_classifier() {
    let resolver = resolver();
    assert_eq!(
        resolver.resolve_at(f64::NAN, 77.0).unwrap_err().kind(),
        "invalid_coordinates"
    );
    assert_eq!(
        resolver.resolve_at(28.0, -180.5).unwrap_err().kind(),
        "invalid_coordinates"
    );
}
