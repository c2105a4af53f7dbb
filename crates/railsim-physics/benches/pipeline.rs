//! Criterion benchmarks for the staged envelope pipeline.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use railsim_physics::{
    Allowance, EnvelopePipeline, EnvelopeRequest, FlatPath, GradeSection, GradedPath,
    PhysicsConfig, SpeedLimit,
};
use railsim_test_utils::fast_train;

/// 50 km line with four stops and two slow zones.
fn line_request() -> EnvelopeRequest {
    EnvelopeRequest::full_path(50_000.0)
        .with_stops(vec![10_000.0, 22_500.0, 31_000.0, 42_000.0])
        .with_speed_limits(vec![
            SpeedLimit {
                begin: 5_000.0,
                end: 7_500.0,
                speed: 22.2,
            },
            SpeedLimit {
                begin: 35_000.0,
                end: 38_000.0,
                speed: 27.8,
            },
        ])
}

fn bench_flat_pipeline(c: &mut Criterion) {
    let stock = fast_train();
    let path = FlatPath::new(50_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = line_request();

    c.bench_function("pipeline_flat_50km", |b| {
        b.iter(|| {
            let envelopes = pipeline.compute(black_box(&request)).unwrap();
            black_box(envelopes.scheduled.total_time());
        });
    });
}

fn bench_graded_pipeline_with_allowance(c: &mut Criterion) {
    let stock = fast_train();
    let path = GradedPath::new(
        50_000.0,
        vec![
            GradeSection {
                begin: 12_000.0,
                end: 18_000.0,
                grade: 8.0,
            },
            GradeSection {
                begin: 25_000.0,
                end: 29_000.0,
                grade: -6.0,
            },
        ],
    )
    .unwrap();
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = line_request().with_allowances(vec![Allowance::distance(4.0)]);

    c.bench_function("pipeline_graded_50km_allowance", |b| {
        b.iter(|| {
            let envelopes = pipeline.compute(black_box(&request)).unwrap();
            black_box(envelopes.allowance_factor);
        });
    });
}

fn bench_time_queries(c: &mut Criterion) {
    let stock = fast_train();
    let path = FlatPath::new(50_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let envelope = pipeline.compute(&line_request()).unwrap().scheduled;
    let total = envelope.total_time();

    c.bench_function("envelope_state_at_time_1k", |b| {
        b.iter(|| {
            for i in 0..1_000 {
                let t = total * i as f64 / 1_000.0;
                black_box(envelope.state_at_time(t).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_flat_pipeline,
    bench_graded_pipeline_with_allowance,
    bench_time_queries
);
criterion_main!(benches);
