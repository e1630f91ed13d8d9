use serde::{Deserialize, Serialize};

use crate::status::GeoError;

/// A "part" of a location
pub type LocationComponent = f64;

/// Milliseconds since the Unix epoch, as reported by the location provider
pub type TimestampMs = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A single position sample reported by a location provider
pub struct Fix {
    /// Latitude in degrees
    #[serde(rename = "lat")]
    pub latitude: LocationComponent,
    /// Longitude in degrees
    #[serde(rename = "lng")]
    pub longitude: LocationComponent,
    /// Radius of the 68% confidence circle, in meters
    #[serde(rename = "accuracy")]
    pub accuracy_meters: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: TimestampMs,
}

impl Fix {
    pub fn new(
        latitude: LocationComponent,
        longitude: LocationComponent,
        accuracy_meters: f64,
        timestamp_ms: TimestampMs,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            timestamp_ms,
        }
    }

    /// Check the sample is something we can do math on, the error describes the first problem
    /// found
    pub fn check_well_formed(&self) -> Result<(), GeoError> {
        check_coordinates(self.latitude, self.longitude).map_err(GeoError::InvalidSample)?;
        if !self.accuracy_meters.is_finite() || self.accuracy_meters < 0.0 {
            return Err(GeoError::InvalidSample(format!(
                "Invalid accuracy {}",
                self.accuracy_meters
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_coordinates(
    latitude: LocationComponent,
    longitude: LocationComponent,
) -> Result<(), String> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("Latitude {latitude} out of range"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("Longitude {longitude} out of range"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A bare point on the globe
pub struct Coordinate {
    #[serde(rename = "lat")]
    pub latitude: LocationComponent,
    #[serde(rename = "lng")]
    pub longitude: LocationComponent,
}

impl Coordinate {
    pub const fn new(latitude: LocationComponent, longitude: LocationComponent) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Anything that sits somewhere on the globe and can be measured between
pub trait Positioned {
    fn coordinate(&self) -> Coordinate;
}

impl Positioned for Coordinate {
    fn coordinate(&self) -> Coordinate {
        *self
    }
}

impl Positioned for Fix {
    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::GeoStatus;

    #[test]
    fn serializes_with_short_names() {
        let fix = Fix::new(37.7749, -122.4194, 12.5, 1_700_000_000_000);
        let json = serde_json::to_value(fix).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "lat": 37.7749,
                "lng": -122.4194,
                "accuracy": 12.5,
                "timestamp": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn well_formed_checks() {
        assert!(Fix::new(0.0, 0.0, 0.0, 0).check_well_formed().is_ok());
        assert!(Fix::new(90.1, 0.0, 5.0, 0).check_well_formed().is_err());
        assert!(Fix::new(0.0, -180.5, 5.0, 0).check_well_formed().is_err());
        assert!(Fix::new(f64::NAN, 0.0, 5.0, 0).check_well_formed().is_err());
        assert!(Fix::new(0.0, 0.0, -1.0, 0).check_well_formed().is_err());
        assert!(
            Fix::new(0.0, 0.0, f64::INFINITY, 0)
                .check_well_formed()
                .is_err()
        );
    }

    #[test]
    fn malformed_sample_is_an_invalid_sample_error() {
        let err = Fix::new(91.0, 0.0, 5.0, 0).check_well_formed().unwrap_err();
        assert_eq!(err, GeoError::InvalidSample("Latitude 91 out of range".to_string()));
        assert_eq!(err.to_string(), "Invalid sample: Latitude 91 out of range");
        assert_eq!(err.status(), GeoStatus::Waiting);

        let err = Fix::new(0.0, 0.0, -3.0, 0).check_well_formed().unwrap_err();
        assert_eq!(err.to_string(), "Invalid sample: Invalid accuracy -3");
    }
}
