//! Braking curves: the highest speed from which every speed drop and
//! every stop can still be respected.

use railsim_envelope::{
    Envelope, EnvelopeAttitude, EnvelopePart, EnvelopePartBuilder, EnvelopeSource,
    POSITION_EPSILON, SPEED_EPSILON,
};
use tracing::trace;

use crate::error::PhysicsError;
use crate::integration::TrainPhysicsIntegrator;
use crate::path::PhysicsPath;

/// A point a braking curve must reach.
#[derive(Clone, Copy, Debug)]
struct BrakingTarget {
    position: f64,
    speed: f64,
    /// The curve may not extend upstream of this position.
    floor: f64,
}

/// Overlay braking curves onto `mrsp`.
///
/// One curve ends at every downward speed jump of `mrsp`, one at every
/// stop, and one at the end of the range (the train halts there). Curves
/// are integrated backward from their target until they meet the
/// ceiling, and are processed right to left so each one meets the
/// curves already placed downstream. A curve never extends upstream of
/// the previous stop. The result is still discontinuous where the
/// ceiling rises.
///
/// # Errors
///
/// [`PhysicsError::StopOutOfPath`] for a stop outside `mrsp`,
/// [`PhysicsError::CannotBrake`] if a curve exceeds `max_steps`, or any
/// envelope composition failure.
pub fn compute_max_speed<P: PhysicsPath + ?Sized>(
    integrator: &TrainPhysicsIntegrator<'_, P>,
    mrsp: &Envelope,
    stops: &[f64],
    max_steps: usize,
) -> Result<Envelope, PhysicsError> {
    let (begin, end) = (mrsp.begin(), mrsp.end());
    let mut halts: Vec<f64> = Vec::with_capacity(stops.len() + 1);
    for &stop in stops {
        if !(begin..=end + POSITION_EPSILON).contains(&stop) {
            return Err(PhysicsError::StopOutOfPath {
                position: stop,
                begin,
                end,
            });
        }
        if stop > begin + POSITION_EPSILON && stop < end - POSITION_EPSILON {
            halts.push(stop);
        }
    }
    halts.push(end);
    halts.sort_by(f64::total_cmp);
    halts.dedup_by(|b, a| *b - *a <= POSITION_EPSILON);

    let floor_of = |position: f64| -> f64 {
        let index = halts.partition_point(|h| *h < position - POSITION_EPSILON);
        if index == 0 {
            begin
        } else {
            halts[index - 1]
        }
    };

    let mut targets: Vec<BrakingTarget> = halts
        .iter()
        .map(|&position| BrakingTarget {
            position,
            speed: 0.0,
            floor: floor_of(position),
        })
        .collect();
    for pair in mrsp.parts().windows(2) {
        let (high, low) = (pair[0].end_speed(), pair[1].begin_speed());
        if low < high - SPEED_EPSILON {
            let position = pair[0].end_pos();
            targets.push(BrakingTarget {
                position,
                speed: low,
                floor: floor_of(position),
            });
        }
    }
    targets.sort_by(|a, b| b.position.total_cmp(&a.position));

    let mut envelope = mrsp.clone();
    for target in targets {
        if let Some(curve) = braking_curve(integrator, &envelope, target, max_steps)? {
            trace!(
                target = target.position,
                from = curve.begin_pos(),
                "braking curve placed"
            );
            envelope = envelope.overlay(curve)?;
        }
    }
    Ok(envelope)
}

fn braking_curve<P: PhysicsPath + ?Sized>(
    integrator: &TrainPhysicsIntegrator<'_, P>,
    ceiling: &Envelope,
    target: BrakingTarget,
    max_steps: usize,
) -> Result<Option<EnvelopePart>, PhysicsError> {
    let (mut x, mut v) = (target.position, target.speed);
    if v >= ceiling.try_interpolate_speed(x)? - SPEED_EPSILON {
        return Ok(None);
    }
    let mut builder = EnvelopePartBuilder::new_backward(EnvelopeAttitude::Braking, EnvelopeSource::Braking);
    builder.add(x, v)?;

    for _ in 0..max_steps {
        let step = integrator.step_back_braking(v);
        let (mut px, mut pv) = (x + step.position_delta, step.end_speed);
        let truncated = px <= target.floor;
        if truncated {
            pv = v + (pv - v) * (x - target.floor) / (x - px);
            px = target.floor;
        }
        let limit = ceiling.try_interpolate_speed(px)?;
        if pv >= limit {
            let crossing = crossing(ceiling, (x, v), (px, pv))?;
            if crossing < x - POSITION_EPSILON {
                builder.add(crossing, ceiling.try_interpolate_speed(crossing)?)?;
            }
            return finish(builder);
        }
        builder.add(px, pv)?;
        if truncated {
            return finish(builder);
        }
        x = px;
        v = pv;
    }
    Err(PhysicsError::CannotBrake {
        position: target.position,
        target_speed: target.speed,
    })
}

fn finish(builder: EnvelopePartBuilder) -> Result<Option<EnvelopePart>, PhysicsError> {
    if builder.len() < 2 {
        return Ok(None);
    }
    Ok(Some(builder.build()?))
}

/// Where the segment from `inside` (under the ceiling) to `outside`
/// (at or above it) crosses `ceiling`, assuming both are linear between
/// the two positions.
pub(crate) fn crossing(
    ceiling: &Envelope,
    inside: (f64, f64),
    outside: (f64, f64),
) -> Result<f64, PhysicsError> {
    let gap_in = inside.1 - ceiling.try_interpolate_speed(inside.0)?;
    let gap_out = outside.1 - ceiling.try_interpolate_speed(outside.0)?;
    let denominator = gap_out - gap_in;
    if denominator <= 0.0 {
        return Ok(inside.0);
    }
    let t = (-gap_in / denominator).clamp(0.0, 1.0);
    Ok(inside.0 + (outside.0 - inside.0) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mrsp::{compute_mrsp, SpeedLimit};
    use crate::path::FlatPath;
    use crate::rolling_stock::{RollingResistance, RollingStock, TractiveEffortCurve, TractivePoint};

    fn stock() -> RollingStock {
        RollingStock {
            id: "unit".into(),
            length: 100.0,
            mass: 100_000.0,
            inertia_coefficient: 1.0,
            max_speed: 40.0,
            rolling_resistance: RollingResistance {
                a: 0.0,
                b: 0.0,
                c: 0.0,
            },
            tractive_effort: TractiveEffortCurve::new([TractivePoint {
                speed: 0.0,
                force: 50_000.0,
            }]),
            service_deceleration: 0.5,
        }
    }

    #[test]
    fn halts_at_range_end() {
        let s = stock();
        let path = FlatPath::new(10_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let mrsp = compute_mrsp(&s, &[], 0.0, 10_000.0).unwrap();
        let env = compute_max_speed(&integrator, &mrsp, &[], 100_000).unwrap();
        assert_eq!(env.end_speed(), 0.0);
        assert_eq!(env.interpolate_speed(1_000.0), 40.0);
        // v² = 2·d·x  →  x = 1600 m to brake from 40 m/s at 0.5 m/s²
        let start = env.parts().last().unwrap().begin_pos();
        assert!((start - (10_000.0 - 1_600.0)).abs() < 1.0, "braking starts at {start}");
    }

    #[test]
    fn stops_reach_zero() {
        let s = stock();
        let path = FlatPath::new(10_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let mrsp = compute_mrsp(&s, &[], 0.0, 10_000.0).unwrap();
        let env = compute_max_speed(&integrator, &mrsp, &[5_000.0], 100_000).unwrap();
        assert_eq!(env.interpolate_speed(5_000.0), 0.0);
        assert!(env.interpolate_speed(4_000.0) < 40.0);
    }

    #[test]
    fn speed_drop_is_anticipated() {
        let s = stock();
        let path = FlatPath::new(10_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let limits = [SpeedLimit {
            begin: 5_000.0,
            end: 6_000.0,
            speed: 20.0,
        }];
        let mrsp = compute_mrsp(&s, &limits, 0.0, 10_000.0).unwrap();
        let env = compute_max_speed(&integrator, &mrsp, &[], 100_000).unwrap();
        // (40² - 20²) / (2 · 0.5) = 1200 m of braking before the drop
        assert!(env.interpolate_speed(4_000.0) < 40.0);
        assert!((env.interpolate_speed(3_700.0) - 40.0).abs() < 1e-9);
        assert!((env.interpolate_speed(5_000.0) - 20.0).abs() < 1e-6);
        // rising edge at 6000 stays discontinuous
        assert!(!env.is_continuous());
    }

    #[test]
    fn stop_outside_range_fails() {
        let s = stock();
        let path = FlatPath::new(1_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let mrsp = compute_mrsp(&s, &[], 0.0, 1_000.0).unwrap();
        assert!(matches!(
            compute_max_speed(&integrator, &mrsp, &[1_500.0], 1_000),
            Err(PhysicsError::StopOutOfPath { .. })
        ));
    }

    #[test]
    fn curve_stops_at_previous_stop() {
        let s = stock();
        let path = FlatPath::new(10_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let mrsp = compute_mrsp(&s, &[], 0.0, 10_000.0).unwrap();
        // 5000 and 5500 are closer than the 1600 m braking distance
        let env = compute_max_speed(&integrator, &mrsp, &[5_000.0, 5_500.0], 100_000).unwrap();
        assert_eq!(env.interpolate_speed(5_000.0), 0.0);
        assert_eq!(env.interpolate_speed(5_500.0), 0.0);
        let after_first = env.find_part(5_000.0 + 1.0).unwrap();
        assert!((env.parts()[after_first].begin_pos() - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn exhausted_step_budget_fails() {
        let s = stock();
        let path = FlatPath::new(10_000.0, 0.0);
        let integrator = TrainPhysicsIntegrator::new(&s, &path, 0.2);
        let mrsp = compute_mrsp(&s, &[], 0.0, 10_000.0).unwrap();
        assert!(matches!(
            compute_max_speed(&integrator, &mrsp, &[], 3),
            Err(PhysicsError::CannotBrake { .. })
        ));
    }
}
