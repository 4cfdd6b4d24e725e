use crate::models::GeoPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Report sent by a GPS tracker client
///
/// Either `tracker` (start/stop) or both `lat` and `lon` are expected.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GpsReportRequest {
    #[validate(length(min = 1, max = 100))]
    pub dev: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: Option<f64>,
    pub tracker: Option<String>,
}

/// Query of a device's records page
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordsQuery {
    /// Search location as "lat,lng"
    pub loc: Option<String>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub limit: usize,
    /// Drop area code false positives beyond the search precision
    #[serde(default)]
    pub exact: bool,
}

fn default_limit() -> usize {
    20
}

/// `loc` parameter that is malformed or out of range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid location {0:?}, expected \"lat,lng\" in [-90, 90] latitude and [-180, 180] longitude")]
pub struct InvalidLocation(pub String);

impl RecordsQuery {
    /// Parses `loc`, `Ok(None)` when it is missing or empty
    pub fn location(&self) -> Result<Option<GeoPoint>, InvalidLocation> {
        let Some(loc) = self.loc.as_deref().map(str::trim).filter(|loc| !loc.is_empty()) else {
            return Ok(None);
        };

        let parsed = loc.split_once(',').and_then(|(lat, lng)| {
            let lat = lat.trim().parse::<f64>().ok()?;
            let lng = lng.trim().parse::<f64>().ok()?;
            Some(GeoPoint::new(lat, lng))
        });

        parsed
            .filter(GeoPoint::is_valid)
            .map(Some)
            .ok_or_else(|| InvalidLocation(loc.to_string()))
    }
}

/// New search precision of a device, in meters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPrecisionRequest {
    #[serde(rename = "searchPrecision")]
    pub search_precision: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(loc: &str) -> RecordsQuery {
        RecordsQuery {
            loc: Some(loc.to_string()),
            limit: 20,
            exact: false,
        }
    }

    #[test]
    fn test_location_parsing() {
        assert_eq!(query("47.5, 19.04").location(), Ok(Some(GeoPoint::new(47.5, 19.04))));
        assert_eq!(query("  ").location(), Ok(None));
        assert_eq!(query("47.5").location(), Err(InvalidLocation("47.5".to_string())));
        assert!(query("abc,1").location().is_err());
        assert!(query("95,1").location().is_err());
    }

    #[test]
    fn test_report_validation() {
        let report = GpsReportRequest {
            dev: "abc".to_string(),
            lat: Some(91.0),
            lon: Some(0.0),
            tracker: None,
        };
        assert!(report.validate().is_err());

        let report = GpsReportRequest {
            dev: "x".repeat(101),
            lat: None,
            lon: None,
            tracker: Some("start".to_string()),
        };
        assert!(report.validate().is_err());
    }
}
