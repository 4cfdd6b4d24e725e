use crate::models::{GeoPoint, Sample, SampleKind, StoredSample};
use crate::services::cache::AreaCodeCache;
use crate::services::store::{DeviceDirectory, RecordStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Longest accepted device id
pub const MAX_RAND_ID_LEN: usize = 100;

/// Errors that can occur when ingesting a report
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Missing or invalid device id")]
    InvalidDevice,

    #[error("Invalid tracker event: {0}")]
    InvalidTracker(String),

    #[error("Invalid geopoint ({lat}, {lng}), valid range: [-90, 90] latitude and [-180, 180] longitude")]
    InvalidPoint { lat: f64, lng: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a tracker reported
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Fix(GeoPoint),
    Tracker(String),
}

/// Ingestion path for device reports
pub struct Ingestor {
    records: Arc<dyn RecordStore>,
    directory: Arc<dyn DeviceDirectory>,
    codes: Arc<AreaCodeCache>,
}

impl Ingestor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        directory: Arc<dyn DeviceDirectory>,
        codes: Arc<AreaCodeCache>,
    ) -> Self {
        Self {
            records,
            directory,
            codes,
        }
    }

    /// Validates and stores one report.
    ///
    /// An unknown device id is accepted silently and nothing is stored, so a
    /// client cannot find out which ids exist. Returns the stored record.
    pub async fn ingest(
        &self,
        rand_id: &str,
        report: Report,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredSample>, IngestError> {
        if rand_id.is_empty() || rand_id.len() > MAX_RAND_ID_LEN {
            return Err(IngestError::InvalidDevice);
        }

        // Validate the payload before looking up the device
        let sample = match report {
            Report::Tracker(event) => match SampleKind::parse(&event) {
                Some(SampleKind::Start) => Sample::start(now),
                Some(SampleKind::Stop) => Sample::stop(now),
                _ => return Err(IngestError::InvalidTracker(event)),
            },
            Report::Fix(point) => {
                if !point.is_valid() {
                    return Err(IngestError::InvalidPoint {
                        lat: point.latitude,
                        lng: point.longitude,
                    });
                }
                Sample::track(point, now)
            }
        };

        let Some(device) = self.directory.device_by_rand_id(rand_id).await? else {
            tracing::debug!("Report for unknown device id, ignoring");
            return Ok(None);
        };

        let area_codes = match sample.track_point() {
            Some(point) if device.indexed() => self.codes.candidate_codes(device.cell_size, &point).to_vec(),
            _ => vec![],
        };

        if device.deletes_old_logs() {
            let cutoff = now - Duration::days(i64::from(device.logs_retention_days));
            let pruned = self.records.prune_before(device.id, cutoff).await?;
            if pruned > 0 {
                tracing::debug!("Pruned {} samples of device {} beyond retention", pruned, device.id);
            }
        }

        let record = StoredSample {
            device_id: device.id,
            sample,
            area_codes,
        };
        self.records.append(record.clone()).await?;

        tracing::debug!(
            "Stored {} sample for device {} with {} area codes",
            record.sample.kind.as_str(),
            device.id,
            record.area_codes.len()
        );

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::area::candidate_codes;
    use crate::models::Device;
    use crate::services::store::MemoryStore;

    async fn setup(cell_size: i64, retention: u32) -> (Arc<MemoryStore>, Ingestor) {
        let store = Arc::new(MemoryStore::new());
        store
            .add_device(Device {
                id: 1,
                name: "Car".to_string(),
                rand_id: "car-rand".to_string(),
                cell_size,
                logs_retention_days: retention,
                account_id: 1,
            })
            .await;

        let ingestor = Ingestor::new(store.clone(), store.clone(), Arc::new(AreaCodeCache::new(100)));
        (store, ingestor)
    }

    #[tokio::test]
    async fn test_indexed_fix_stores_candidate_codes() {
        let (store, ingestor) = setup(2000, 0).await;
        let point = GeoPoint::new(47.4979, 19.0402);

        let record = ingestor
            .ingest("car-rand", Report::Fix(point), Utc::now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.area_codes, candidate_codes(2000, &point));
        assert_eq!(store.sample_count(1).await, 1);
    }

    #[tokio::test]
    async fn test_unindexed_fix_stores_no_codes() {
        let (_store, ingestor) = setup(0, 0).await;
        let record = ingestor
            .ingest("car-rand", Report::Fix(GeoPoint::new(1.0, 1.0)), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(record.area_codes.is_empty());
    }

    #[tokio::test]
    async fn test_events_store_no_codes() {
        let (_store, ingestor) = setup(2000, 0).await;
        let record = ingestor
            .ingest("car-rand", Report::Tracker("stop".to_string()), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sample.kind, SampleKind::Stop);
        assert!(record.area_codes.is_empty());
        assert_eq!(record.sample.point, None);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let (store, ingestor) = setup(2000, 0).await;
        let now = Utc::now();

        assert!(matches!(
            ingestor.ingest("", Report::Fix(GeoPoint::new(1.0, 1.0)), now).await,
            Err(IngestError::InvalidDevice)
        ));
        assert!(matches!(
            ingestor.ingest(&"x".repeat(101), Report::Fix(GeoPoint::new(1.0, 1.0)), now).await,
            Err(IngestError::InvalidDevice)
        ));
        assert!(matches!(
            ingestor.ingest("car-rand", Report::Fix(GeoPoint::new(91.0, 1.0)), now).await,
            Err(IngestError::InvalidPoint { .. })
        ));
        assert!(matches!(
            ingestor.ingest("car-rand", Report::Tracker("track".to_string()), now).await,
            Err(IngestError::InvalidTracker(_))
        ));
        assert_eq!(store.sample_count(1).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_device_is_silently_ignored() {
        let (store, ingestor) = setup(2000, 0).await;
        let result = ingestor
            .ingest("nope", Report::Fix(GeoPoint::new(1.0, 1.0)), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.sample_count(1).await, 0);
    }

    #[tokio::test]
    async fn test_retention_prunes_old_samples() {
        let (store, ingestor) = setup(0, 1).await;
        let now = Utc::now();
        let point = GeoPoint::new(1.0, 1.0);

        ingestor
            .ingest("car-rand", Report::Fix(point), now - Duration::days(2))
            .await
            .unwrap();
        ingestor.ingest("car-rand", Report::Fix(point), now).await.unwrap();

        let records = store.records(1).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sample.timestamp, now);
    }
}
