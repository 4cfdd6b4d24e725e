use crate::core::area::area_codes_intersect;
use crate::models::{Account, AlertPair, AreaCode, CellSize, Device, Sample, StoredSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when reading or writing records
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of device samples
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends one sample with its area codes
    async fn append(&self, record: StoredSample) -> Result<(), StoreError>;

    /// Returns up to `limit` most recent samples of a device, newest first,
    /// optionally only those stored with at least one of `area_codes`
    async fn fetch_recent(
        &self,
        device_id: i64,
        limit: usize,
        area_codes: Option<&[AreaCode]>,
    ) -> Result<Vec<Sample>, StoreError>;

    /// Deletes samples of a device older than `cutoff`, returns the count
    async fn prune_before(&self, device_id: i64, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Devices, alert pairs and accounts
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn device_by_rand_id(&self, rand_id: &str) -> Result<Option<Device>, StoreError>;

    async fn device(&self, id: i64) -> Result<Option<Device>, StoreError>;

    /// Changes the area size of a device, returns false if it does not exist
    async fn update_cell_size(&self, id: i64, cell_size: CellSize) -> Result<bool, StoreError>;

    async fn alert_pairs(&self) -> Result<Vec<AlertPair>, StoreError>;

    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError>;
}

/// In-memory store, used when no database is configured and in tests
#[derive(Default)]
pub struct MemoryStore {
    samples: RwLock<HashMap<i64, Vec<StoredSample>>>,
    devices: RwLock<HashMap<i64, Device>>,
    pairs: RwLock<Vec<AlertPair>>,
    accounts: RwLock<HashMap<i64, Account>>,
    failing: RwLock<HashSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_device(&self, device: Device) {
        self.devices.write().await.insert(device.id, device);
    }

    pub async fn add_pair(&self, pair: AlertPair) {
        self.pairs.write().await.push(pair);
    }

    pub async fn add_account(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }

    /// Makes every read of the device's samples fail
    pub async fn fail_reads_for(&self, device_id: i64) {
        self.failing.write().await.insert(device_id);
    }

    /// Number of samples stored for a device
    pub async fn sample_count(&self, device_id: i64) -> usize {
        self.samples
            .read()
            .await
            .get(&device_id)
            .map_or(0, Vec::len)
    }

    /// Stored records of a device in insertion order
    pub async fn records(&self, device_id: i64) -> Vec<StoredSample> {
        self.samples
            .read()
            .await
            .get(&device_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, record: StoredSample) -> Result<(), StoreError> {
        self.samples
            .write()
            .await
            .entry(record.device_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn fetch_recent(
        &self,
        device_id: i64,
        limit: usize,
        area_codes: Option<&[AreaCode]>,
    ) -> Result<Vec<Sample>, StoreError> {
        if self.failing.read().await.contains(&device_id) {
            return Err(StoreError::Unavailable(format!(
                "reads failing for device {}",
                device_id
            )));
        }

        let samples = self.samples.read().await;
        let mut records: Vec<&StoredSample> = samples
            .get(&device_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| area_codes.map_or(true, |codes| area_codes_intersect(&r.area_codes, codes)))
                    .collect()
            })
            .unwrap_or_default();

        records.sort_by(|a, b| b.sample.timestamp.cmp(&a.sample.timestamp));

        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| r.sample.clone())
            .collect())
    }

    async fn prune_before(&self, device_id: i64, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut samples = self.samples.write().await;
        let Some(records) = samples.get_mut(&device_id) else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|r| r.sample.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[async_trait]
impl DeviceDirectory for MemoryStore {
    async fn device_by_rand_id(&self, rand_id: &str) -> Result<Option<Device>, StoreError> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .find(|d| d.rand_id == rand_id)
            .cloned())
    }

    async fn device(&self, id: i64) -> Result<Option<Device>, StoreError> {
        Ok(self.devices.read().await.get(&id).cloned())
    }

    async fn update_cell_size(&self, id: i64, cell_size: CellSize) -> Result<bool, StoreError> {
        let mut devices = self.devices.write().await;
        let Some(device) = devices.get_mut(&id) else {
            return Ok(false);
        };
        device.cell_size = cell_size;
        Ok(true)
    }

    async fn alert_pairs(&self) -> Result<Vec<AlertPair>, StoreError> {
        Ok(self.pairs.read().await.clone())
    }

    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::Duration;

    fn record(device_id: i64, secs_ago: i64, codes: Vec<AreaCode>) -> StoredSample {
        StoredSample {
            device_id,
            sample: Sample::track(
                GeoPoint::new(47.0, 19.0),
                Utc::now() - Duration::seconds(secs_ago),
            ),
            area_codes: codes,
        }
    }

    #[tokio::test]
    async fn test_fetch_recent_newest_first_and_limited() {
        let store = MemoryStore::new();
        for secs_ago in [30, 10, 50, 20, 40] {
            store.append(record(1, secs_ago, vec![])).await.unwrap();
        }

        let window = store.fetch_recent(1, 3, None).await.unwrap();
        assert_eq!(window.len(), 3);
        assert!(window[0].timestamp > window[1].timestamp);
        assert!(window[1].timestamp > window[2].timestamp);
    }

    #[tokio::test]
    async fn test_fetch_recent_area_filter() {
        let store = MemoryStore::new();
        store.append(record(1, 10, vec![AreaCode(1), AreaCode(2)])).await.unwrap();
        store.append(record(1, 20, vec![AreaCode(3)])).await.unwrap();

        let hits = store.fetch_recent(1, 7, Some(&[AreaCode(9), AreaCode(2)])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.fetch_recent(1, 7, Some(&[AreaCode(9)])).await.unwrap().len(), 0);
        assert_eq!(store.fetch_recent(1, 7, Some(&[])).await.unwrap().len(), 0);
        assert!(store.fetch_recent(2, 7, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_before() {
        let store = MemoryStore::new();
        store.append(record(1, 10, vec![])).await.unwrap();
        store.append(record(1, 1000, vec![])).await.unwrap();

        let pruned = store
            .prune_before(1, Utc::now() - Duration::seconds(500))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.sample_count(1).await, 1);
    }

    #[tokio::test]
    async fn test_update_cell_size() {
        let store = MemoryStore::new();
        store
            .add_device(Device {
                id: 1,
                name: "Car".to_string(),
                rand_id: "abc".to_string(),
                cell_size: 0,
                logs_retention_days: 0,
                account_id: 1,
            })
            .await;

        assert!(store.update_cell_size(1, 2000).await.unwrap());
        assert_eq!(store.device(1).await.unwrap().map(|d| d.cell_size), Some(2000));
        assert!(!store.update_cell_size(2, 2000).await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let store = MemoryStore::new();
        store.fail_reads_for(1).await;
        assert!(matches!(
            store.fetch_recent(1, 7, None).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
