use crate::core::movement::SampleDelta;
use crate::models::domain::{Device, GeoPoint, SampleKind};
use crate::services::CacheStats;
use serde::{Deserialize, Serialize};

/// One record of a device's records page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
    pub kind: SampleKind,
    pub point: Option<GeoPoint>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub delta: Option<SampleDelta>,
}

/// Response for the device records endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    #[serde(rename = "deviceId")]
    pub device_id: i64,
    #[serde(rename = "searchPrecisionM")]
    pub search_precision_m: Option<i64>,
    pub records: Vec<RecordView>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub area_code_cache: CacheStats,
}

/// Device settings after an update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub device: Device,
    #[serde(rename = "searchPrecisionM")]
    pub search_precision_m: i64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
