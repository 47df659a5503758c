use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration,
};
use fleet_telemetry::flow_analyzer::CongestionDetector;
use fleet_telemetry::shared_data::{
    current_timestamp, CongestionLevel, TelemetryRecord, VehicleCategory,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generates a dummy batch spread over `roads` roads.
/// Speeds cycle between 8 and 44 km/h so some roads come out congested.
fn generate_dummy_batch(batch_size: usize, roads: usize) -> Vec<TelemetryRecord> {
    (0..batch_size)
        .map(|i| {
            let speed = 8.0 + ((i % 10) as f64) * 4.0;
            TelemetryRecord {
                vehicle_id: format!("V{:04}", i % 200 + 1),
                timestamp: current_timestamp(),
                latitude: 40.75,
                longitude: -74.0,
                speed,
                road_id: format!("RD{:03}", i % roads + 1),
                road_name: format!("Road {}", i % roads + 1),
                vehicle_type: VehicleCategory::Car,
                congestion_level: CongestionLevel::from_speed(speed),
            }
        })
        .collect()
}

/// Benchmarks congestion detection for batch sizes from a normal tick (25)
/// up to a large fleet export (5000).
fn bench_detect(c: &mut Criterion) {
    let batch_sizes = [25, 500, 5000];
    let detector = CongestionDetector::default();

    let mut group = c.benchmark_group("congestion_detector");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &batch in batch_sizes.iter() {
        let records = generate_dummy_batch(batch, 4);
        let mut rng = StdRng::seed_from_u64(7);

        group.bench_with_input(BenchmarkId::new("detect", batch), &batch, |b, &_batch| {
            b.iter(|| {
                let alerts = detector.detect(black_box(&records), &mut rng);
                black_box(alerts);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
