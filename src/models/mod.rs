// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Account, AlertKind, AlertPair, AlertVerdict, AreaCode, CellSize, Device, DeviceError, GeoPoint,
    Sample, SampleKind, StoredSample,
};
pub use requests::{GpsReportRequest, InvalidLocation, RecordsQuery, SearchPrecisionRequest};
pub use responses::{DeviceResponse, ErrorResponse, HealthResponse, RecordView, RecordsResponse};
