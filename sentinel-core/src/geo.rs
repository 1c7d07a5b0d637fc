//! Coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

use crate::error::SentinelError;

/// Mean Earth radius used by the haversine formula, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SentinelError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(SentinelError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Great-circle distance in kilometres, unrounded.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = b.longitude.to_radians() - a.longitude.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c / 1000.0
}

/// Great-circle distance in kilometres, rounded to two decimals.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    round_to_hundredths(haversine_km(a, b))
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_values() {
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(-90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.01).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
    }

    #[test]
    fn invalid_coordinates_carry_the_inputs() {
        let err = Coordinate::new(100.0, 5.0).unwrap_err();
        assert_eq!(
            err,
            SentinelError::InvalidCoordinates {
                latitude: 100.0,
                longitude: 5.0
            }
        );
    }

    #[test]
    fn distance_to_self_is_zero() {
        let delhi = coord(28.7041, 77.1025);
        assert_eq!(distance_km(delhi, delhi), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(28.7041, 77.1025), coord(26.8467, 80.9462)),
            (coord(-33.8688, 151.2093), coord(51.5074, -0.1278)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
            assert_eq!(distance_km(a, b), distance_km(b, a));
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(coord(0.0, 0.0), coord(1.0, 0.0));
        assert_eq!(d, 111.19);
    }

    #[test]
    fn delhi_to_lucknow_is_roughly_430_km() {
        let d = distance_km(coord(28.7041, 77.1025), coord(26.8467, 80.9462));
        assert!((420.0..440.0).contains(&d), "unexpected distance {d}");
        assert_eq!(d, (d * 100.0).round() / 100.0);
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let d = haversine_km(coord(0.0, 0.0), coord(0.0, 180.0));
        let expected = std::f64::consts::PI * EARTH_RADIUS_M / 1000.0;
        assert!((d - expected).abs() < 1e-6);
    }
}
