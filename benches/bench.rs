// Criterion benchmarks for Tracksentry

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tracksentry::core::area::candidate_codes;
use tracksentry::core::movement::MovementDetector;
use tracksentry::core::projection::distance;
use tracksentry::core::AlertEvaluator;
use tracksentry::models::{AlertPair, GeoPoint, Sample, StoredSample};
use tracksentry::services::{AreaCodeCache, MemoryStore, RecordStore};

fn track_window(len: usize) -> Vec<Sample> {
    let now = Utc::now();
    (0..len)
        .map(|i| {
            Sample::track(
                GeoPoint::new(47.4979 + i as f64 * 0.0001, 19.0402),
                now - Duration::seconds(30 * i as i64),
            )
        })
        .collect()
}

fn bench_distance(c: &mut Criterion) {
    let a = GeoPoint::new(47.4979, 19.0402);
    let b = GeoPoint::new(47.5100, 19.0600);

    c.bench_function("distance", |bencher| {
        bencher.iter(|| distance(black_box(&a), black_box(&b)))
    });
}

fn bench_candidate_codes(c: &mut Criterion) {
    let point = GeoPoint::new(-33.8688, 151.2093);
    let mut group = c.benchmark_group("candidate_codes");

    for cell_size in [100, 2000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(cell_size), &cell_size, |bencher, &size| {
            bencher.iter(|| candidate_codes(black_box(size), black_box(&point)))
        });
    }

    group.finish();

    let cache = AreaCodeCache::new(1000);
    c.bench_function("candidate_codes_cached", |bencher| {
        bencher.iter(|| cache.candidate_codes(black_box(2000), black_box(&point)))
    });
}

fn bench_movement(c: &mut Criterion) {
    let detector = MovementDetector::default();
    let mut group = c.benchmark_group("moved");

    for len in [2, 7, 50] {
        let window = track_window(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &window, |bencher, window| {
            bencher.iter(|| detector.moved(black_box(window)))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };

    let store = MemoryStore::new();
    runtime.block_on(async {
        for (device_id, window) in [(10, track_window(7)), (20, track_window(7))] {
            for sample in window {
                let _ = store
                    .append(StoredSample {
                        device_id,
                        sample,
                        area_codes: vec![],
                    })
                    .await;
            }
        }
    });

    let pair = AlertPair {
        id: 1,
        account_id: 1,
        asset_id: 10,
        asset_name: "Car".to_string(),
        companion_id: Some(20),
        companion_name: Some("Phone".to_string()),
    };
    let evaluator = AlertEvaluator::default();

    c.bench_function("evaluate_pair", |bencher| {
        bencher.iter(|| runtime.block_on(evaluator.evaluate(black_box(&pair), &store, Utc::now())))
    });
}

criterion_group!(
    benches,
    bench_distance,
    bench_candidate_codes,
    bench_movement,
    bench_evaluate
);
criterion_main!(benches);
