//! Scheduling allowances (margins).
//!
//! Every allowance kind is converted to a percentage of extra running
//! time, then to one speed scale factor `f = 1 / (1 + pct / 100)`
//! applied uniformly to the envelope. Scaling every speed by `f`
//! multiplies every running time by `1 + pct / 100`.

use railsim_envelope::Envelope;
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Path length, in metres, over which a DISTANCE allowance value applies.
///
/// A DISTANCE allowance of `v` adds `v` minutes per 100 km of path.
pub const DISTANCE_ALLOWANCE_UNIT: f64 = 100_000.0;

/// How an allowance value is expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllowanceKind {
    /// Percent of the running time.
    Percentage,
    /// Minutes per [`DISTANCE_ALLOWANCE_UNIT`] of path.
    Distance,
    /// Seconds over the whole path.
    Time,
}

/// A scheduling margin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allowance {
    /// Unit of `value`.
    pub kind: AllowanceKind,
    /// Amount of margin.
    pub value: f64,
}

impl Allowance {
    /// `value` percent of extra running time.
    pub fn percentage(value: f64) -> Self {
        Self {
            kind: AllowanceKind::Percentage,
            value,
        }
    }

    /// `minutes` of extra running time per 100 km.
    pub fn distance(minutes: f64) -> Self {
        Self {
            kind: AllowanceKind::Distance,
            value: minutes,
        }
    }

    /// `seconds` of extra running time over the whole path.
    pub fn time(seconds: f64) -> Self {
        Self {
            kind: AllowanceKind::Time,
            value: seconds,
        }
    }

    /// This allowance as a percentage of `envelope`'s running time.
    ///
    /// DISTANCE and TIME allowances measure the running time by sampling
    /// the envelope every `sample_step` metres.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidAllowance`] for a negative or non-finite
    /// value, [`PhysicsError::ZeroRunningTime`] when a DISTANCE or TIME
    /// allowance meets an envelope that takes no time.
    pub fn to_percentage(&self, envelope: &Envelope, sample_step: f64) -> Result<f64, PhysicsError> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(PhysicsError::InvalidAllowance {
                value: self.value,
                reason: "allowance must be a non-negative finite number",
            });
        }
        if self.kind == AllowanceKind::Percentage {
            return Ok(self.value);
        }
        let samples = expected_times(envelope, sample_step)?;
        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(PhysicsError::ZeroRunningTime),
        };
        let total_time = last.1 - first.1;
        if !total_time.is_finite() || total_time <= 0.0 {
            return Err(PhysicsError::ZeroRunningTime);
        }
        let percentage = match self.kind {
            AllowanceKind::Distance => {
                let portions = (last.0 - first.0) / DISTANCE_ALLOWANCE_UNIT;
                let seconds = portions * self.value * 60.0;
                100.0 * seconds / total_time
            }
            AllowanceKind::Time => 100.0 * self.value / total_time,
            AllowanceKind::Percentage => self.value,
        };
        Ok(percentage)
    }

    /// The speed scale factor realizing this allowance on `envelope`.
    ///
    /// # Errors
    ///
    /// As [`to_percentage`](Self::to_percentage).
    pub fn scale_factor(&self, envelope: &Envelope, sample_step: f64) -> Result<f64, PhysicsError> {
        Ok(scale_factor(self.to_percentage(envelope, sample_step)?))
    }
}

/// Speed scale factor for `percentage` extra running time.
pub fn scale_factor(percentage: f64) -> f64 {
    1.0 / (1.0 + percentage / 100.0)
}

/// Time to reach each sampled position of `envelope`.
///
/// Positions run from `begin` to `end` every `step` metres; `end` is
/// always the last sample.
///
/// # Errors
///
/// [`PhysicsError::InvalidConfig`] for a non-positive step.
pub fn expected_times(envelope: &Envelope, step: f64) -> Result<Vec<(f64, f64)>, PhysicsError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(PhysicsError::InvalidConfig {
            field: "allowance_sample_step",
            value: step,
        });
    }
    let (begin, end) = (envelope.begin(), envelope.end());
    let count = ((end - begin) / step).floor() as usize;
    let mut samples = Vec::with_capacity(count + 2);
    for i in 0..=count {
        let position = begin + i as f64 * step;
        if position >= end {
            break;
        }
        samples.push((position, envelope.time_at(position)?));
    }
    samples.push((end, envelope.time_at(end)?));
    Ok(samples)
}

/// Apply `allowances` one after the other.
///
/// Returns the scaled envelope and the combined scale factor. Each
/// allowance is measured against the envelope produced by the previous
/// ones, so margins compound.
///
/// # Errors
///
/// As [`Allowance::to_percentage`].
pub fn apply_allowances(
    envelope: &Envelope,
    allowances: &[Allowance],
    sample_step: f64,
) -> Result<(Envelope, f64), PhysicsError> {
    let mut factor = 1.0;
    let mut current = envelope.clone();
    for allowance in allowances {
        let f = allowance.scale_factor(&current, sample_step)?;
        current = current.scaled(f);
        factor *= f;
    }
    Ok((current, factor))
}
