//! End-to-end envelope pipeline scenarios on fixture rolling stock.

use railsim_envelope::{Envelope, EnvelopePart, EnvelopeSource, POSITION_EPSILON, SPEED_EPSILON};
use railsim_physics::allowance::apply_allowances;
use railsim_physics::{
    Allowance, EnvelopePipeline, EnvelopeRequest, FlatPath, GradeSection, GradedPath,
    PhysicsConfig, PhysicsError, SpeedLimit,
};
use railsim_test_utils::{fast_train, slow_freight};

fn flat_limit(length: f64, speed: f64) -> Vec<SpeedLimit> {
    vec![SpeedLimit {
        begin: 0.0,
        end: length,
        speed,
    }]
}

fn assert_gap_free(envelope: &Envelope) {
    for pair in envelope.parts().windows(2) {
        assert!(
            (pair[0].end_pos() - pair[1].begin_pos()).abs() <= POSITION_EPSILON,
            "gap between {} and {}",
            pair[0].end_pos(),
            pair[1].begin_pos()
        );
        assert!((pair[0].end_speed() - pair[1].begin_speed()).abs() <= SPEED_EPSILON);
    }
}

// ── Single stop on a flat line ─────────────────────────────────

#[test]
fn flat_line_with_one_stop_is_continuous_and_halts() {
    let stock = fast_train();
    let path = FlatPath::new(10_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = EnvelopeRequest::full_path(10_000.0)
        .with_speed_limits(flat_limit(10_000.0, 44.4))
        .with_stops(vec![8_500.0]);

    let envelopes = pipeline.compute(&request).unwrap();
    let envelope = &envelopes.max_effort;

    assert!(envelope.is_continuous());
    assert_gap_free(envelope);
    assert_eq!(envelope.begin(), 0.0);
    assert_eq!(envelope.end(), 10_000.0);
    assert_eq!(envelope.interpolate_speed(8_500.0), 0.0);
    assert_eq!(envelope.end_speed(), 0.0);
    assert!(envelope.max_speed() <= 44.4 + SPEED_EPSILON);
    // the ceiling is reached between the start and the stop
    assert!((envelope.interpolate_speed(5_000.0) - 44.4).abs() < 1e-6);
}

#[test]
fn max_effort_never_exceeds_max_speed() {
    let stock = fast_train();
    let path = FlatPath::new(20_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = EnvelopeRequest::full_path(20_000.0)
        .with_speed_limits(vec![
            SpeedLimit {
                begin: 0.0,
                end: 20_000.0,
                speed: 44.4,
            },
            SpeedLimit {
                begin: 7_000.0,
                end: 9_000.0,
                speed: 16.7,
            },
        ])
        .with_stops(vec![14_000.0]);
    let envelopes = pipeline.compute(&request).unwrap();

    for i in 0..=2_000 {
        let x = i as f64 * 10.0;
        let actual = envelopes.max_effort.interpolate_speed(x);
        let ceiling = envelopes.max_speed.interpolate_speed(x);
        assert!(actual <= ceiling + 1e-6, "{actual} above {ceiling} at {x}");
    }
    assert!((envelopes.max_effort.interpolate_speed(8_000.0) - 16.7).abs() < 1e-6);
}

// ── Allowances ─────────────────────────────────────────────────

#[test]
fn percentage_allowance_scales_running_time() {
    let flat = Envelope::new(vec![EnvelopePart::constant(
        EnvelopeSource::MaxEffort,
        0.0,
        10_000.0,
        44.4,
    )
    .unwrap()])
    .unwrap();
    let base = flat.total_time();
    assert!((base - 10_000.0 / 44.4).abs() < 1e-9);

    for value in [0.0, 5.0, 12.5, 40.0] {
        let (scaled, _) = apply_allowances(&flat, &[Allowance::percentage(value)], 1.0).unwrap();
        let expected = base * (1.0 + value / 100.0);
        assert!(
            (scaled.total_time() - expected).abs() < 1e-6,
            "{value} %: {} vs {expected}",
            scaled.total_time()
        );
    }
}

#[test]
fn allowances_keep_stops() {
    let stock = fast_train();
    let path = FlatPath::new(10_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = EnvelopeRequest::full_path(10_000.0)
        .with_speed_limits(flat_limit(10_000.0, 44.4))
        .with_stops(vec![8_500.0])
        .with_allowances(vec![Allowance::time(30.0)]);
    let envelopes = pipeline.compute(&request).unwrap();

    assert_eq!(envelopes.scheduled.interpolate_speed(8_500.0), 0.0);
    let delta = envelopes.scheduled.total_time() - envelopes.max_effort.total_time();
    assert!((delta - 30.0).abs() < 1e-3, "added {delta} s");
}

#[test]
fn distance_allowance_on_short_path() {
    let stock = fast_train();
    let path = FlatPath::new(10_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    // 5 min per 100 km over 10 km = 30 s
    let request = EnvelopeRequest::full_path(10_000.0)
        .with_speed_limits(flat_limit(10_000.0, 44.4))
        .with_allowances(vec![Allowance::distance(5.0)]);
    let envelopes = pipeline.compute(&request).unwrap();
    let delta = envelopes.scheduled.total_time() - envelopes.max_effort.total_time();
    assert!((delta - 30.0).abs() < 1e-3, "added {delta} s");
}

// ── Gradients ──────────────────────────────────────────────────

#[test]
fn uphill_is_slower_than_flat() {
    let stock = slow_freight();
    let config = PhysicsConfig::default();
    let request = EnvelopeRequest::full_path(15_000.0);

    let flat = FlatPath::new(15_000.0, 0.0);
    let flat_time = EnvelopePipeline::new(&stock, &flat, &config)
        .unwrap()
        .compute(&request)
        .unwrap()
        .scheduled
        .total_time();

    let hill = GradedPath::new(
        15_000.0,
        vec![GradeSection {
            begin: 2_000.0,
            end: 12_000.0,
            grade: 10.0,
        }],
    )
    .unwrap();
    let hill_time = EnvelopePipeline::new(&stock, &hill, &config)
        .unwrap()
        .compute(&request)
        .unwrap()
        .scheduled
        .total_time();

    assert!(hill_time > flat_time, "{hill_time} <= {flat_time}");
}

#[test]
fn stop_outside_path_is_rejected() {
    let stock = fast_train();
    let path = FlatPath::new(10_000.0, 0.0);
    let config = PhysicsConfig::default();
    let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
    let request = EnvelopeRequest::full_path(10_000.0).with_stops(vec![12_000.0]);
    assert!(matches!(
        pipeline.compute(&request),
        Err(PhysicsError::StopOutOfPath { .. })
    ));
}
