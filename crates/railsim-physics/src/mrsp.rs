//! Most restrictive speed profile.

use railsim_envelope::{Envelope, EnvelopePart, EnvelopeSource, POSITION_EPSILON};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::rolling_stock::RollingStock;

/// A static track speed limit over `[begin, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedLimit {
    /// First position.
    pub begin: f64,
    /// Position where the limit stops applying.
    pub end: f64,
    /// Highest permitted speed, m/s.
    pub speed: f64,
}

/// The static speed ceiling over `[begin, end]`.
///
/// At every position this is the lowest of the train's rated speed and
/// every track limit covering it. The result is piecewise constant and
/// jumps in speed at limit boundaries, so it is built discontinuous.
/// Parts are tagged [`EnvelopeSource::TrackLimit`] where a track limit
/// binds and [`EnvelopeSource::TrainLimit`] elsewhere.
///
/// # Errors
///
/// [`PhysicsError::InvalidPath`] for an empty range or a limit that is
/// not a positive finite speed.
pub fn compute_mrsp(
    stock: &RollingStock,
    limits: &[SpeedLimit],
    begin: f64,
    end: f64,
) -> Result<Envelope, PhysicsError> {
    if !(begin.is_finite() && end.is_finite()) || end - begin <= POSITION_EPSILON {
        return Err(PhysicsError::InvalidPath {
            reason: format!("empty speed profile range [{begin}, {end}]"),
        });
    }
    if let Some(bad) = limits
        .iter()
        .find(|l| !l.speed.is_finite() || l.speed <= 0.0 || l.end < l.begin || l.begin.is_nan())
    {
        return Err(PhysicsError::InvalidPath {
            reason: format!(
                "speed limit {} over [{}, {}] is invalid",
                bad.speed, bad.begin, bad.end
            ),
        });
    }

    let mut breakpoints = vec![begin, end];
    for limit in limits {
        for p in [limit.begin, limit.end] {
            if p > begin && p < end {
                breakpoints.push(p);
            }
        }
    }
    breakpoints.sort_by(f64::total_cmp);
    breakpoints.dedup_by(|b, a| *b - *a <= POSITION_EPSILON);
    if let Some(last) = breakpoints.last_mut() {
        *last = end;
    }

    let mut ranges: Vec<(f64, f64, f64, EnvelopeSource)> = Vec::new();
    for window in breakpoints.windows(2) {
        let (a, b) = (window[0], window[1]);
        let mid = (a + b) / 2.0;
        let track = limits
            .iter()
            .filter(|l| l.begin <= mid && mid < l.end)
            .map(|l| l.speed)
            .fold(f64::INFINITY, f64::min);
        let (speed, source) = if track < stock.max_speed {
            (track, EnvelopeSource::TrackLimit)
        } else {
            (stock.max_speed, EnvelopeSource::TrainLimit)
        };
        match ranges.last_mut() {
            Some(last) if last.2 == speed && last.3 == source => last.1 = b,
            _ => ranges.push((a, b, speed, source)),
        }
    }

    let parts = ranges
        .into_iter()
        .map(|(a, b, speed, source)| EnvelopePart::constant(source, a, b, speed))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Envelope::new_discontinuous(parts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rolling_stock::{RollingResistance, TractiveEffortCurve, TractivePoint};

    fn stock(max_speed: f64) -> RollingStock {
        RollingStock {
            id: "unit".into(),
            length: 100.0,
            mass: 1_000.0,
            inertia_coefficient: 1.0,
            max_speed,
            rolling_resistance: RollingResistance {
                a: 0.0,
                b: 0.0,
                c: 0.0,
            },
            tractive_effort: TractiveEffortCurve::new([TractivePoint {
                speed: 0.0,
                force: 1_000.0,
            }]),
            service_deceleration: 0.5,
        }
    }

    #[test]
    fn no_limits_gives_train_limit() {
        let env = compute_mrsp(&stock(30.0), &[], 0.0, 1000.0).unwrap();
        assert_eq!(env.part_count(), 1);
        assert_eq!(env.parts()[0].source(), EnvelopeSource::TrainLimit);
        assert_eq!(env.interpolate_speed(500.0), 30.0);
    }

    #[test]
    fn lowest_limit_wins() {
        let limits = [
            SpeedLimit {
                begin: 0.0,
                end: 600.0,
                speed: 20.0,
            },
            SpeedLimit {
                begin: 400.0,
                end: 1000.0,
                speed: 10.0,
            },
        ];
        let env = compute_mrsp(&stock(30.0), &limits, 0.0, 1000.0).unwrap();
        assert_eq!(env.part_count(), 2);
        assert_eq!(env.interpolate_speed(100.0), 20.0);
        assert_eq!(env.interpolate_speed(500.0), 10.0);
        assert_eq!(env.parts()[1].begin_pos(), 400.0);
        assert_eq!(env.parts()[1].source(), EnvelopeSource::TrackLimit);
        assert!(!env.is_continuous());
    }

    #[test]
    fn train_limit_caps_track_limit() {
        let limits = [SpeedLimit {
            begin: 0.0,
            end: 500.0,
            speed: 50.0,
        }];
        let env = compute_mrsp(&stock(30.0), &limits, 0.0, 1000.0).unwrap();
        assert_eq!(env.part_count(), 1);
        assert_eq!(env.max_speed(), 30.0);
    }

    #[test]
    fn clipped_to_requested_range() {
        let limits = [SpeedLimit {
            begin: 200.0,
            end: 300.0,
            speed: 5.0,
        }];
        let env = compute_mrsp(&stock(30.0), &limits, 250.0, 1000.0).unwrap();
        assert_eq!(env.begin(), 250.0);
        assert_eq!(env.interpolate_speed(260.0), 5.0);
        assert_eq!(env.interpolate_speed(400.0), 30.0);
    }

    #[test]
    fn zero_limit_rejected() {
        let limits = [SpeedLimit {
            begin: 0.0,
            end: 10.0,
            speed: 0.0,
        }];
        assert!(matches!(
            compute_mrsp(&stock(30.0), &limits, 0.0, 100.0),
            Err(PhysicsError::InvalidPath { .. })
        ));
    }
}
