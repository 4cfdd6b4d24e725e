//! Tracksentry - GPS tracking service with asset/companion alerts
//!
//! Devices report GPS fixes and start/stop events. Samples are indexed with
//! area codes so location searches work without a spatial database index,
//! and each asset is checked periodically against its companion device.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{AlertEvaluator, AlertPolicy, MovementDetector, distance};
pub use models::{AlertPair, AlertVerdict, AreaCode, Device, GeoPoint, Sample, SampleKind};
