use crate::core::area::MIN_CELL_SIZE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Kind of a reported sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Track,
    Start,
    Stop,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Track => "track",
            SampleKind::Start => "start",
            SampleKind::Stop => "stop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "track" => Some(SampleKind::Track),
            "start" => Some(SampleKind::Start),
            "stop" => Some(SampleKind::Stop),
            _ => None,
        }
    }
}

/// One observation reported by a device.
///
/// `point` is present iff `kind == Track`; the constructors keep that
/// invariant, so build samples through them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub point: Option<GeoPoint>,
    pub kind: SampleKind,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn track(point: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            point: Some(point),
            kind: SampleKind::Track,
            timestamp,
        }
    }

    pub fn start(timestamp: DateTime<Utc>) -> Self {
        Self {
            point: None,
            kind: SampleKind::Start,
            timestamp,
        }
    }

    pub fn stop(timestamp: DateTime<Utc>) -> Self {
        Self {
            point: None,
            kind: SampleKind::Stop,
            timestamp,
        }
    }

    /// Returns the point of a track sample
    #[inline]
    pub fn track_point(&self) -> Option<GeoPoint> {
        match self.kind {
            SampleKind::Track => self.point,
            _ => None,
        }
    }

    pub fn is_track(&self) -> bool {
        self.track_point().is_some()
    }
}

/// Opaque grid cell key used as an equality filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaCode(pub i64);

/// Grid spacing in meters
pub type CellSize = i64;

/// Sample as persisted by a record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    pub device_id: i64,
    pub sample: Sample,
    #[serde(default)]
    pub area_codes: Vec<AreaCode>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Search precision {0} is outside of valid range (0..1,000,000)")]
    SearchPrecisionOutOfRange(i64),

    #[error("Search precision {0} is not a multiple of 100")]
    SearchPrecisionNotMultiple(i64),

    #[error("Search precision {0} is too fine for a world-wide grid")]
    SearchPrecisionTooFine(i64),
}

/// Tracking device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    /// Random id the tracker sends with every report
    #[serde(default, skip_serializing)]
    pub rand_id: String,
    /// Area size for location searches in meters, 0 means not indexed
    pub cell_size: CellSize,
    /// Days to keep samples, 0 means forever
    pub logs_retention_days: u32,
    pub account_id: i64,
}

impl Device {
    pub fn indexed(&self) -> bool {
        self.cell_size > 0
    }

    pub fn search_precision(&self) -> i64 {
        self.cell_size / 2
    }

    pub fn set_search_precision(&mut self, precision: i64) -> Result<(), DeviceError> {
        if !(0..=1_000_000).contains(&precision) {
            return Err(DeviceError::SearchPrecisionOutOfRange(precision));
        }
        if precision % 100 != 0 {
            return Err(DeviceError::SearchPrecisionNotMultiple(precision));
        }
        if precision > 0 && precision * 2 < MIN_CELL_SIZE {
            return Err(DeviceError::SearchPrecisionTooFine(precision));
        }
        self.cell_size = precision * 2;
        Ok(())
    }

    pub fn deletes_old_logs(&self) -> bool {
        self.logs_retention_days > 0
    }
}

/// Account that receives alert notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// Asset device paired with an optional companion device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPair {
    pub id: i64,
    pub account_id: i64,
    pub asset_id: i64,
    pub asset_name: String,
    #[serde(default)]
    pub companion_id: Option<i64>,
    #[serde(default)]
    pub companion_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DeviceSilent,
    MovingWithoutCompanion,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::DeviceSilent => "device_silent",
            AlertKind::MovingWithoutCompanion => "moving_without_companion",
        }
    }
}

/// Outcome of one pair evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AlertVerdict {
    None,
    DeviceSilent { device_id: i64 },
    MovingWithoutCompanion { asset_id: i64, companion_id: i64 },
}

impl AlertVerdict {
    pub fn kind(&self) -> Option<AlertKind> {
        match self {
            AlertVerdict::None => None,
            AlertVerdict::DeviceSilent { .. } => Some(AlertKind::DeviceSilent),
            AlertVerdict::MovingWithoutCompanion { .. } => Some(AlertKind::MovingWithoutCompanion),
        }
    }

    /// Device ids implicated by the verdict
    pub fn devices(&self) -> Vec<i64> {
        match *self {
            AlertVerdict::None => vec![],
            AlertVerdict::DeviceSilent { device_id } => vec![device_id],
            AlertVerdict::MovingWithoutCompanion {
                asset_id,
                companion_id,
            } => vec![asset_id, companion_id],
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, AlertVerdict::None)
    }
}
