//! SOS alert composition.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::geo::Coordinate;
use crate::resolver::{NearestStation, StationResolver};

/// Username used when the reporter did not give one.
pub const ANONYMOUS_REPORTER: &str = "Guest";

/// Emergency report as submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosRequest {
    #[serde(default)]
    pub username: String,
    pub mobile: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Composed alert, optionally enriched with the nearest station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SosAlert {
    pub username: String,
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_station: Option<NearestStation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// The alert text broadcast to responders.
pub fn sos_message(request: &SosRequest) -> String {
    format!(
        "Emergency! Please help me at (address: {}, Latitude: {}, Longitude: {}, mobile: {})",
        request.address,
        degrees_text(request.latitude),
        degrees_text(request.longitude),
        request.mobile
    )
}

/// Shortest round-trip form, keeping a trailing `.0` on whole degrees.
fn degrees_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Validate the reported position and build the alert.
///
/// With a resolver, the nearest station and its distance are attached. A failed
/// station lookup is logged and leaves those fields empty; the alert still goes out.
pub fn compose_sos_alert(
    request: &SosRequest,
    resolver: Option<&StationResolver>,
) -> Result<SosAlert, SentinelError> {
    let coordinate = Coordinate::new(request.latitude, request.longitude)?;
    let username = match request.username.trim() {
        "" => ANONYMOUS_REPORTER.to_string(),
        name => name.to_string(),
    };
    let message = sos_message(request);
    info!("SOS raised by {username}: {message}");

    let (nearest_station, distance_km) = match resolver.map(|r| r.nearest_with_distance(coordinate))
    {
        Some(Ok((station, distance))) => (Some(station), Some(distance)),
        Some(Err(err)) => {
            warn!("SOS from {username} sent without station details: {err}");
            (None, None)
        }
        None => (None, None),
    };

    Ok(SosAlert {
        username,
        message,
        latitude: coordinate.latitude(),
        longitude: coordinate.longitude(),
        nearest_station,
        distance_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{FacilityRecord, FacilityTable};
    use crate::station::StationClassifier;

    struct FixedLabel(&'static str);

    impl StationClassifier for FixedLabel {
        fn predict(&self, _coordinate: Coordinate) -> Result<String, SentinelError> {
            Ok(self.0.to_string())
        }
    }

    fn request() -> SosRequest {
        SosRequest {
            username: "asha".into(),
            mobile: "9876543210".into(),
            address: "12 Mall Road".into(),
            latitude: 26.8467,
            longitude: 80.9462,
        }
    }

    fn resolver(label: &'static str) -> StationResolver {
        StationResolver::new(
            Box::new(FixedLabel(label)),
            FacilityTable::from_records(vec![FacilityRecord {
                name: "Hazratganj".into(),
                contact_number: "05222615555".into(),
                latitude: 26.85,
                longitude: 80.94,
            }]),
        )
    }

    #[test]
    fn message_embeds_every_field() {
        assert_eq!(
            sos_message(&request()),
            "Emergency! Please help me at (address: 12 Mall Road, Latitude: 26.8467, Longitude: 80.9462, mobile: 9876543210)"
        );
    }

    #[test]
    fn whole_degree_coordinates_keep_decimal_point() {
        let mut whole = request();
        whole.latitude = 28.0;
        whole.longitude = -77.0;
        assert_eq!(
            sos_message(&whole),
            "Emergency! Please help me at (address: 12 Mall Road, Latitude: 28.0, Longitude: -77.0, mobile: 9876543210)"
        );
        assert_eq!(degrees_text(0.0), "0.0");
        assert_eq!(degrees_text(77.1025), "77.1025");
    }

    #[test]
    fn alert_without_resolver_has_no_station() {
        let alert = compose_sos_alert(&request(), None).unwrap();
        assert_eq!(alert.username, "asha");
        assert!(alert.nearest_station.is_none());
        assert!(alert.distance_km.is_none());
    }

    #[test]
    fn alert_is_enriched_with_nearest_station() {
        let resolver = resolver("hazrat");
        let alert = compose_sos_alert(&request(), Some(&resolver)).unwrap();
        let station = alert.nearest_station.unwrap();
        assert_eq!(station.facility.name, "Hazratganj");
        assert!(alert.distance_km.unwrap() < 2.0);
    }

    #[test]
    fn station_failure_does_not_block_alert() {
        let resolver = resolver("Nowhere");
        let alert = compose_sos_alert(&request(), Some(&resolver)).unwrap();
        assert!(alert.message.starts_with("Emergency!"));
        assert!(alert.nearest_station.is_none());
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let mut bad = request();
        bad.longitude = 200.0;
        let err = compose_sos_alert(&bad, None).unwrap_err();
        assert_eq!(err.kind(), "invalid_coordinates");
    }

    #[test]
    fn blank_username_becomes_guest() {
        let mut anonymous = request();
        anonymous.username = "  ".into();
        let alert = compose_sos_alert(&anonymous, None).unwrap();
        assert_eq!(alert.username, ANONYMOUS_REPORTER);
    }
}
