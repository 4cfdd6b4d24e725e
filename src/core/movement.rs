use crate::core::projection::distance;
use crate::models::{GeoPoint, Sample};
use serde::{Deserialize, Serialize};

/// Minimum distance between track samples that counts as moving, in meters
pub const DEFAULT_MOVEMENT_THRESHOLD_M: i64 = 230;

/// Decides whether a device moved more than GPS jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementDetector {
    threshold_m: i64,
}

impl MovementDetector {
    pub fn new(threshold_m: i64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold_m(&self) -> i64 {
        self.threshold_m
    }

    /// Tells if the device moved based on its latest samples.
    ///
    /// Event samples are skipped. Adjacent track samples further apart than
    /// the threshold report moving right away; otherwise the first and last
    /// track samples are compared too, which catches slow steady drift.
    /// At least 2 track samples are needed to report moving.
    pub fn moved(&self, samples: &[Sample]) -> bool {
        let mut first: Option<GeoPoint> = None;
        let mut last: Option<GeoPoint> = None;

        for point in samples.iter().filter_map(Sample::track_point) {
            if first.is_none() {
                first = Some(point);
            }
            if let Some(prev) = last {
                if distance(&prev, &point) > self.threshold_m {
                    return true;
                }
            }
            last = Some(point);
        }

        match (first, last) {
            (Some(first), Some(last)) => distance(&first, &last) > self.threshold_m,
            _ => false,
        }
    }
}

impl Default for MovementDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_THRESHOLD_M)
    }
}

/// Movement metrics of a track sample relative to the previous (in time) one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleDelta {
    #[serde(rename = "distanceM")]
    pub distance_m: i64,
    #[serde(rename = "elapsedSecs")]
    pub elapsed_secs: i64,
    #[serde(rename = "speedKmh")]
    pub speed_kmh: Option<f64>,
}

/// Annotates a newest-first window with per-sample deltas.
///
/// The delta of a track sample is measured to the next older track sample,
/// skipping interleaved events. Events and the oldest track sample get `None`.
pub fn annotate_deltas(samples: &[Sample]) -> Vec<Option<SampleDelta>> {
    let mut deltas = vec![None; samples.len()];

    for (i, sample) in samples.iter().enumerate() {
        let Some(point) = sample.track_point() else {
            continue;
        };
        let older = samples[i + 1..]
            .iter()
            .find_map(|s| s.track_point().map(|p| (p, s.timestamp)));

        if let Some((prev_point, prev_time)) = older {
            let distance_m = distance(&point, &prev_point);
            let elapsed_secs = (sample.timestamp - prev_time).num_seconds();
            let speed_kmh = if elapsed_secs > 0 {
                Some(distance_m as f64 / elapsed_secs as f64 * 3.6)
            } else {
                None
            };

            deltas[i] = Some(SampleDelta {
                distance_m,
                elapsed_secs,
                speed_kmh,
            });
        }
    }

    deltas
}
