use crate::core::movement::{MovementDetector, DEFAULT_MOVEMENT_THRESHOLD_M};
use crate::core::projection::distance;
use crate::models::{AlertPair, AlertVerdict, GeoPoint, Sample};
use crate::services::store::{RecordStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors that abort the evaluation of one pair without raising an alert
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("No samples for device {0}")]
    DataUnavailable(i64),

    #[error("Failed to read samples of device {device_id}: {source}")]
    Store {
        device_id: i64,
        #[source]
        source: StoreError,
    },
}

/// Tunable constants of the alert check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// A device is silent if its newest sample is older than this
    pub liveness: Duration,
    /// Allowed asset/companion separation in meters
    pub base_margin_m: i64,
    /// Margin added per second of time gap, in m/s
    pub fix_latency_mps: f64,
    /// Number of most recent samples evaluated per device
    pub window_size: usize,
    pub movement: MovementDetector,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            liveness: Duration::minutes(5),
            base_margin_m: 500,
            fix_latency_mps: 6.0,
            window_size: 7,
            movement: MovementDetector::new(DEFAULT_MOVEMENT_THRESHOLD_M),
        }
    }
}

/// Latest positional fixes needed to judge asset/companion separation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityInput {
    pub asset_latest: (GeoPoint, DateTime<Utc>),
    pub asset_previous: (GeoPoint, DateTime<Utc>),
    pub companion_fix: (GeoPoint, DateTime<Utc>),
    pub companion_moving: bool,
}

/// Derived quantities of a proximity check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityCheck {
    pub asset_speed_mps: f64,
    pub time_gap_secs: f64,
    pub gap_m: i64,
    pub margin_m: i64,
}

impl ProximityCheck {
    pub fn too_far(&self) -> bool {
        self.gap_m > self.margin_m
    }
}

/// Checks an alert pair: is the asset alive, and is it moving together with
/// its companion?
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEvaluator {
    policy: AlertPolicy,
}

impl AlertEvaluator {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    fn is_stale(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - timestamp > self.policy.liveness
    }

    /// Allowed separation for the given asset speed and fix time gap.
    ///
    /// The margin only widens when the companion moves too. A stationary
    /// companion must not let the asset drive kilometers away unnoticed.
    pub fn alert_margin(&self, asset_speed_mps: f64, time_gap_secs: f64, companion_moving: bool) -> i64 {
        let mut margin = self.policy.base_margin_m;
        if companion_moving {
            margin += (asset_speed_mps * time_gap_secs + time_gap_secs * self.policy.fix_latency_mps) as i64;
        }
        margin
    }

    /// Computes speed, time gap, separation and margin from the latest fixes
    pub fn proximity_check(&self, input: &ProximityInput) -> ProximityCheck {
        let (c1, c1_time) = input.asset_latest;
        let (c2, c2_time) = input.asset_previous;
        let (p1, p1_time) = input.companion_fix;

        let asset_dt = (c1_time - c2_time).num_milliseconds() as f64 / 1000.0;
        let asset_speed_mps = if asset_dt > 0.0 {
            distance(&c1, &c2) as f64 / asset_dt
        } else {
            0.0
        };
        let time_gap_secs = ((c1_time - p1_time).num_milliseconds() as f64 / 1000.0).abs();
        let gap_m = distance(&c1, &p1);
        let margin_m = self.alert_margin(asset_speed_mps, time_gap_secs, input.companion_moving);

        ProximityCheck {
            asset_speed_mps,
            time_gap_secs,
            gap_m,
            margin_m,
        }
    }

    /// Evaluates one alert pair at `now`.
    ///
    /// Returns an error when the asset has no samples or any read fails; the
    /// caller logs it and raises no alert.
    pub async fn evaluate(
        &self,
        pair: &AlertPair,
        store: &dyn RecordStore,
        now: DateTime<Utc>,
    ) -> Result<AlertVerdict, EvaluationError> {
        let asset_id = pair.asset_id;
        let asset = self.fetch_window(store, asset_id).await?;
        let Some(asset_newest) = asset.first() else {
            tracing::warn!("No samples for asset device {}, skipping pair {}", asset_id, pair.id);
            return Err(EvaluationError::DataUnavailable(asset_id));
        };

        if self.is_stale(asset_newest.timestamp, now) {
            tracing::warn!(
                "No asset samples in the last {} minutes (device {})",
                self.policy.liveness.num_minutes(),
                asset_id
            );
            return Ok(AlertVerdict::DeviceSilent { device_id: asset_id });
        }

        let Some(companion_id) = pair.companion_id else {
            tracing::debug!("Asset {} is alive, no companion device configured", asset_id);
            return Ok(AlertVerdict::None);
        };

        if !self.policy.movement.moved(&asset) {
            tracing::info!(
                "Asset {} is not moving ({} m threshold). Ok.",
                asset_id,
                self.policy.movement.threshold_m()
            );
            return Ok(AlertVerdict::None);
        }
        tracing::info!("Asset {} is moving", asset_id);

        let moving_alone = AlertVerdict::MovingWithoutCompanion {
            asset_id,
            companion_id,
        };

        let companion = self.fetch_window(store, companion_id).await?;
        match companion.first() {
            Some(newest) if !self.is_stale(newest.timestamp, now) => {}
            _ => {
                tracing::warn!(
                    "No companion samples in the last {} minutes (device {})",
                    self.policy.liveness.num_minutes(),
                    companion_id
                );
                return Ok(moving_alone);
            }
        }

        let companion_moving = self.policy.movement.moved(&companion);
        tracing::info!(
            "Companion {} is {}moving",
            companion_id,
            if companion_moving { "" } else { "NOT " }
        );

        // A recent event alone is not enough, distance needs a recent fix
        let companion_fix = companion
            .iter()
            .find_map(|s| s.track_point().map(|p| (p, s.timestamp)));
        let companion_fix = match companion_fix {
            Some(fix) if !self.is_stale(fix.1, now) => fix,
            _ => {
                tracing::warn!(
                    "No companion track sample in the last {} minutes (device {})",
                    self.policy.liveness.num_minutes(),
                    companion_id
                );
                return Ok(moving_alone);
            }
        };

        let mut asset_fixes = asset
            .iter()
            .filter_map(|s| s.track_point().map(|p| (p, s.timestamp)));
        let (Some(asset_latest), Some(asset_previous)) = (asset_fixes.next(), asset_fixes.next()) else {
            // Moving implies 2 track samples
            return Ok(AlertVerdict::None);
        };

        let check = self.proximity_check(&ProximityInput {
            asset_latest,
            asset_previous,
            companion_fix,
            companion_moving,
        });

        tracing::debug!("Asset movement speed: {:.1} km/h", check.asset_speed_mps * 3.6);
        tracing::debug!("Time gap between latest asset and companion fixes: {} s", check.time_gap_secs as i64);
        tracing::debug!("Asset - companion distance: {} m", check.gap_m);
        tracing::debug!("Using alert margin distance: {} m", check.margin_m);

        if check.too_far() {
            tracing::warn!("Companion {} is not moving together with asset {}", companion_id, asset_id);
            return Ok(moving_alone);
        }

        tracing::info!("Asset {} and companion {} are moving together. Ok.", asset_id, companion_id);
        Ok(AlertVerdict::None)
    }

    async fn fetch_window(&self, store: &dyn RecordStore, device_id: i64) -> Result<Vec<Sample>, EvaluationError> {
        store
            .fetch_recent(device_id, self.policy.window_size, None)
            .await
            .map_err(|source| {
                tracing::error!("Failed to get latest samples of device {}: {}", device_id, source);
                EvaluationError::Store { device_id, source }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredSample;
    use crate::services::store::MemoryStore;

    const METERS_PER_DEGREE: f64 = 111_195.083_724_191_4;

    fn north_of(meters: f64) -> GeoPoint {
        GeoPoint::new(meters / METERS_PER_DEGREE, 0.0)
    }

    fn pair(companion: Option<i64>) -> AlertPair {
        AlertPair {
            id: 1,
            account_id: 1,
            asset_id: 10,
            asset_name: "Car".to_string(),
            companion_id: companion,
            companion_name: companion.map(|_| "Phone".to_string()),
        }
    }

    async fn push(store: &MemoryStore, device_id: i64, sample: Sample) {
        store
            .append(StoredSample {
                device_id,
                sample,
                area_codes: vec![],
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_margin_widening() {
        let evaluator = AlertEvaluator::default();
        assert_eq!(evaluator.alert_margin(10.0, 30.0, true), 980);
        assert_eq!(evaluator.alert_margin(10.0, 30.0, false), 500);
        assert_eq!(evaluator.alert_margin(0.0, 0.0, true), 500);
    }

    #[test]
    fn test_proximity_zero_time_delta_has_zero_speed() {
        let now = Utc::now();
        let evaluator = AlertEvaluator::default();
        let check = evaluator.proximity_check(&ProximityInput {
            asset_latest: (north_of(300.0), now),
            asset_previous: (north_of(0.0), now),
            companion_fix: (north_of(300.0), now),
            companion_moving: true,
        });
        assert_eq!(check.asset_speed_mps, 0.0);
        assert_eq!(check.margin_m, 500);
        assert!(!check.too_far());
    }

    #[test]
    fn test_proximity_time_gap_is_absolute() {
        let now = Utc::now();
        let evaluator = AlertEvaluator::default();
        let check = evaluator.proximity_check(&ProximityInput {
            asset_latest: (north_of(600.0), now - Duration::seconds(30)),
            asset_previous: (north_of(0.0), now - Duration::seconds(90)),
            companion_fix: (north_of(600.0), now),
            companion_moving: false,
        });
        assert_eq!(check.time_gap_secs, 30.0);
        assert_eq!(check.gap_m, 0);
    }

    #[tokio::test]
    async fn test_missing_asset_data_is_an_error() {
        let store = MemoryStore::new();
        let result = AlertEvaluator::default()
            .evaluate(&pair(Some(20)), &store, Utc::now())
            .await;
        assert!(matches!(result, Err(EvaluationError::DataUnavailable(10))));
    }

    #[tokio::test]
    async fn test_stationary_asset_is_never_suspicious() {
        let store = MemoryStore::new();
        let now = Utc::now();
        push(&store, 10, Sample::track(north_of(0.0), now - Duration::seconds(10))).await;
        push(&store, 10, Sample::track(north_of(50.0), now - Duration::seconds(70))).await;

        let verdict = AlertEvaluator::default()
            .evaluate(&pair(Some(20)), &store, now)
            .await
            .unwrap();
        assert_eq!(verdict, AlertVerdict::None);
    }

    #[tokio::test]
    async fn test_companion_event_only_is_moving_without_companion() {
        let store = MemoryStore::new();
        let now = Utc::now();
        push(&store, 10, Sample::track(north_of(300.0), now - Duration::seconds(10))).await;
        push(&store, 10, Sample::track(north_of(0.0), now - Duration::seconds(70))).await;
        push(&store, 20, Sample::start(now - Duration::seconds(20))).await;

        let verdict = AlertEvaluator::default()
            .evaluate(&pair(Some(20)), &store, now)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            AlertVerdict::MovingWithoutCompanion {
                asset_id: 10,
                companion_id: 20
            }
        );
    }

    #[tokio::test]
    async fn test_stale_companion_fix_with_recent_event_is_moving_without_companion() {
        let store = MemoryStore::new();
        let now = Utc::now();
        push(&store, 10, Sample::track(north_of(300.0), now - Duration::seconds(10))).await;
        push(&store, 10, Sample::track(north_of(0.0), now - Duration::seconds(70))).await;
        // Same spot as the asset, but the fix is older than the liveness window
        push(&store, 20, Sample::track(north_of(300.0), now - Duration::minutes(6))).await;
        push(&store, 20, Sample::start(now - Duration::seconds(20))).await;

        let verdict = AlertEvaluator::default()
            .evaluate(&pair(Some(20)), &store, now)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            AlertVerdict::MovingWithoutCompanion {
                asset_id: 10,
                companion_id: 20
            }
        );
    }

    #[tokio::test]
    async fn test_companion_read_failure_raises_no_alert() {
        let store = MemoryStore::new();
        let now = Utc::now();
        push(&store, 10, Sample::track(north_of(300.0), now - Duration::seconds(10))).await;
        push(&store, 10, Sample::track(north_of(0.0), now - Duration::seconds(70))).await;
        store.fail_reads_for(20).await;

        let result = AlertEvaluator::default()
            .evaluate(&pair(Some(20)), &store, now)
            .await;
        assert!(matches!(result, Err(EvaluationError::Store { device_id: 20, .. })));
    }
}
