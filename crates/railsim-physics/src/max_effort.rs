//! Acceleration curves: what the train actually achieves at full power.

use railsim_envelope::{
    Envelope, EnvelopeAttitude, EnvelopePart, EnvelopePartBuilder, EnvelopeSource,
    POSITION_EPSILON, SPEED_EPSILON,
};
use tracing::trace;

use crate::error::PhysicsError;
use crate::integration::TrainPhysicsIntegrator;
use crate::max_speed::crossing;
use crate::path::PhysicsPath;

/// Overlay full-power acceleration curves onto `max_speed`.
///
/// A curve starts at the beginning of the range when `initial_speed` is
/// below the ceiling, and at every upward speed jump (including the
/// restart after each stop). Each is integrated forward until it meets
/// the ceiling. Jumps already passed by an earlier curve are skipped,
/// since the train never reaches them at the ceiling speed.
///
/// The result is speed-continuous.
///
/// # Errors
///
/// [`PhysicsError::InitialSpeedTooHigh`] if `initial_speed` is above the
/// ceiling at the start, [`PhysicsError::TrainCannotStart`] if traction
/// cannot overcome resistance, [`PhysicsError::IntegrationLimit`] if a
/// curve exceeds `max_steps`, or any envelope composition failure.
pub fn compute_max_effort<P: PhysicsPath + ?Sized>(
    integrator: &TrainPhysicsIntegrator<'_, P>,
    max_speed: &Envelope,
    initial_speed: f64,
    max_steps: usize,
) -> Result<Envelope, PhysicsError> {
    let begin = max_speed.begin();
    let allowed = max_speed.try_interpolate_speed(begin)?;
    if initial_speed > allowed + SPEED_EPSILON {
        return Err(PhysicsError::InitialSpeedTooHigh {
            speed: initial_speed,
            allowed,
        });
    }

    let mut starts: Vec<(f64, f64)> = Vec::new();
    if initial_speed < allowed - SPEED_EPSILON {
        starts.push((begin, initial_speed.max(0.0)));
    }
    for pair in max_speed.parts().windows(2) {
        if pair[0].end_speed() < pair[1].begin_speed() - SPEED_EPSILON {
            starts.push((pair[0].end_pos(), pair[0].end_speed()));
        }
    }

    let mut envelope = max_speed.clone();
    let mut covered_until = f64::NEG_INFINITY;
    for (position, speed) in starts {
        if position < covered_until - POSITION_EPSILON {
            continue;
        }
        if let Some(curve) = acceleration_curve(integrator, &envelope, position, speed, max_steps)? {
            trace!(from = position, to = curve.end_pos(), "acceleration curve placed");
            covered_until = curve.end_pos();
            envelope = envelope.overlay(curve)?;
        }
    }
    Ok(envelope.into_continuous()?)
}

fn acceleration_curve<P: PhysicsPath + ?Sized>(
    integrator: &TrainPhysicsIntegrator<'_, P>,
    ceiling: &Envelope,
    start: f64,
    start_speed: f64,
    max_steps: usize,
) -> Result<Option<EnvelopePart>, PhysicsError> {
    let end = ceiling.end();
    let mut builder = EnvelopePartBuilder::new(EnvelopeAttitude::Accelerating, EnvelopeSource::Acceleration);
    builder.add(start, start_speed)?;
    let (mut x, mut v) = (start, start_speed);

    for _ in 0..max_steps {
        let step = integrator.step(x, v, integrator.max_traction(v));
        if step.position_delta <= 0.0 {
            return Err(PhysicsError::TrainCannotStart { position: x });
        }
        let (mut px, mut pv) = (x + step.position_delta, step.end_speed);
        let truncated = px >= end;
        if truncated {
            pv = v + (pv - v) * (end - x) / (px - x);
            px = end;
        }
        let limit = ceiling.try_interpolate_speed(px)?;
        if pv >= limit {
            let crossing = crossing(ceiling, (x, v), (px, pv))?;
            if crossing > x + POSITION_EPSILON {
                builder.add(crossing, ceiling.try_interpolate_speed(crossing)?)?;
            }
            return finish(builder);
        }
        if pv <= 0.0 {
            return Err(PhysicsError::TrainCannotStart { position: px });
        }
        builder.add(px, pv)?;
        if truncated {
            return finish(builder);
        }
        x = px;
        v = pv;
    }
    Err(PhysicsError::IntegrationLimit { steps: max_steps })
}

fn finish(builder: EnvelopePartBuilder) -> Result<Option<EnvelopePart>, PhysicsError> {
    if builder.len() < 2 {
        return Ok(None);
    }
    Ok(Some(builder.build()?))
}
