//! A single run of speed samples over strictly increasing positions.

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

// ── Tags ────────────────────────────────────────────────────────

/// What the driver is doing over a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeAttitude {
    /// Gaining speed under traction.
    Accelerating,
    /// Holding a speed limit.
    ConstantSpeed,
    /// No traction, no brakes.
    Coasting,
    /// Brakes applied.
    Braking,
}

/// Why a part exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeSource {
    /// The train reached its rated maximum speed.
    TrainLimit,
    /// The train reached the line speed of the track.
    TrackLimit,
    /// The train lacks the power to overcome resistance and slows down.
    MaxEffort,
    /// The train is gaining speed.
    Acceleration,
    /// The train is losing speed because its brakes are applied.
    Braking,
}

// ── EnvelopePart ────────────────────────────────────────────────

/// An immutable, strictly increasing run of `(position, speed)` samples.
///
/// Speed between two samples is linearly interpolated in position. The
/// time needed to cross a segment is `Δposition / mean(speed)`, which is
/// exact for constant acceleration over the segment; those deltas are
/// computed on first use and cached.
///
/// Equality and hashing consider attitude, source, positions, and
/// speeds. Cached times never participate.
///
/// # Examples
///
/// ```
/// use railsim_envelope::{EnvelopeAttitude, EnvelopePart, EnvelopeSource};
///
/// let part = EnvelopePart::new(
///     EnvelopeAttitude::Accelerating,
///     EnvelopeSource::Acceleration,
///     vec![1.5, 5.0],
///     vec![3.0, 4.0],
/// )
/// .unwrap();
/// assert!((part.interpolate_speed(2.75) - 3.357142857).abs() < 1e-6);
/// ```
#[derive(Clone, Debug)]
pub struct EnvelopePart {
    attitude: EnvelopeAttitude,
    source: EnvelopeSource,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    times: OnceLock<Vec<f64>>,
}

impl EnvelopePart {
    /// Build a part from matching position and speed samples.
    ///
    /// # Errors
    ///
    /// Fails if there are fewer than two samples, the arrays differ in
    /// length, a value is not finite, a speed is negative, positions do
    /// not strictly increase, or a segment has zero speed at both ends.
    pub fn new(
        attitude: EnvelopeAttitude,
        source: EnvelopeSource,
        positions: Vec<f64>,
        speeds: Vec<f64>,
    ) -> Result<Self, EnvelopeError> {
        validate_samples(&positions, &speeds)?;
        Ok(Self {
            attitude,
            source,
            positions,
            speeds,
            times: OnceLock::new(),
        })
    }

    /// Build a part with precomputed segment times.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus a length mismatch or a non-finite /
    /// non-positive entry in `times`.
    pub fn with_times(
        attitude: EnvelopeAttitude,
        source: EnvelopeSource,
        positions: Vec<f64>,
        speeds: Vec<f64>,
        times: Vec<f64>,
    ) -> Result<Self, EnvelopeError> {
        validate_samples(&positions, &speeds)?;
        if times.len() + 1 != positions.len() {
            return Err(EnvelopeError::TimesLengthMismatch {
                times: times.len(),
                points: positions.len(),
            });
        }
        if let Some((index, &value)) = times
            .iter()
            .enumerate()
            .find(|(_, t)| !t.is_finite() || **t <= 0.0)
        {
            return Err(EnvelopeError::InvalidValue { index, value });
        }
        let cache = OnceLock::new();
        let _ = cache.set(times);
        Ok(Self {
            attitude,
            source,
            positions,
            speeds,
            times: cache,
        })
    }

    /// A two-point part holding `speed` from `begin` to `end`.
    ///
    /// # Errors
    ///
    /// Fails if `begin >= end`, or `speed` is not a positive finite number.
    pub fn constant(
        source: EnvelopeSource,
        begin: f64,
        end: f64,
        speed: f64,
    ) -> Result<Self, EnvelopeError> {
        Self::new(
            EnvelopeAttitude::ConstantSpeed,
            source,
            vec![begin, end],
            vec![speed, speed],
        )
    }

    /// What the driver is doing over this part.
    pub fn attitude(&self) -> EnvelopeAttitude {
        self.attitude
    }

    /// Why this part exists.
    pub fn source(&self) -> EnvelopeSource {
        self.source
    }

    /// Number of samples (always at least 2).
    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    /// Sample positions, strictly increasing.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Sample speeds, one per position.
    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    /// First position.
    pub fn begin_pos(&self) -> f64 {
        self.positions[0]
    }

    /// Last position.
    pub fn end_pos(&self) -> f64 {
        self.positions[self.positions.len() - 1]
    }

    /// Speed at the first position.
    pub fn begin_speed(&self) -> f64 {
        self.speeds[0]
    }

    /// Speed at the last position.
    pub fn end_speed(&self) -> f64 {
        self.speeds[self.speeds.len() - 1]
    }

    /// Highest sampled speed.
    pub fn max_speed(&self) -> f64 {
        self.speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Lowest sampled speed.
    pub fn min_speed(&self) -> f64 {
        self.speeds.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Whether `position` lies within `[begin_pos, end_pos]`.
    pub fn contains(&self, position: f64) -> bool {
        position >= self.begin_pos() && position <= self.end_pos()
    }

    /// Time needed to cross each segment, computed on first use.
    pub fn times(&self) -> &[f64] {
        self.times.get_or_init(|| {
            self.positions
                .windows(2)
                .zip(self.speeds.windows(2))
                .map(|(p, v)| segment_time(p[1] - p[0], v[0], v[1]))
                .collect()
        })
    }

    /// Time needed to cross the whole part.
    pub fn total_time(&self) -> f64 {
        self.times().iter().sum()
    }

    // ── Position queries ───────────────────────────────────────

    /// Index of the segment containing `position`.
    ///
    /// A position equal to an interior sample belongs to the segment
    /// below it. The first sample resolves to segment 0 and the last one
    /// to the final segment.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] outside `[begin_pos, end_pos]`.
    pub fn try_pos_index(&self, position: f64) -> Result<usize, EnvelopeError> {
        if !self.contains(position) {
            return Err(self.out_of_range(position));
        }
        let first_not_below = self.positions.partition_point(|p| *p < position);
        Ok(first_not_below.saturating_sub(1))
    }

    /// Panicking variant of [`try_pos_index`](Self::try_pos_index).
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside `[begin_pos, end_pos]`.
    pub fn pos_index(&self, position: f64) -> usize {
        match self.try_pos_index(position) {
            Ok(index) => index,
            Err(e) => panic!("{e}"),
        }
    }

    /// Linearly interpolated speed at `position`.
    ///
    /// Returns the recorded speed exactly when `position` is a sample.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] outside `[begin_pos, end_pos]`.
    pub fn try_interpolate_speed(&self, position: f64) -> Result<f64, EnvelopeError> {
        let index = self.try_pos_index(position)?;
        Ok(self.segment_speed(index, position))
    }

    /// Panicking variant of [`try_interpolate_speed`](Self::try_interpolate_speed).
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside `[begin_pos, end_pos]`.
    pub fn interpolate_speed(&self, position: f64) -> f64 {
        match self.try_interpolate_speed(position) {
            Ok(speed) => speed,
            Err(e) => panic!("{e}"),
        }
    }

    /// Time needed to travel from `begin_pos` to `position`.
    ///
    /// Within a segment the train is assumed to accelerate uniformly in
    /// time, consistent with [`times`](Self::times).
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] outside `[begin_pos, end_pos]`.
    pub fn time_at(&self, position: f64) -> Result<f64, EnvelopeError> {
        let index = self.try_pos_index(position)?;
        let times = self.times();
        let before: f64 = times[..index].iter().sum();
        let dx = position - self.positions[index];
        let v0 = self.speeds[index];
        let a = self.segment_acceleration(index);
        Ok(before + time_to_cover(dx, v0, a))
    }

    /// Position and speed reached `elapsed` seconds after `begin_pos`.
    ///
    /// Returns `None` if `elapsed` is negative or exceeds
    /// [`total_time`](Self::total_time).
    pub fn state_after(&self, elapsed: f64) -> Option<(f64, f64)> {
        if elapsed < 0.0 {
            return None;
        }
        let mut remaining = elapsed;
        for (index, &dt) in self.times().iter().enumerate() {
            if remaining <= dt {
                let v0 = self.speeds[index];
                let a = self.segment_acceleration(index);
                let x = self.positions[index] + v0 * remaining + 0.5 * a * remaining * remaining;
                let v = (v0 + a * remaining).max(0.0);
                let x = x.min(self.positions[index + 1]);
                return Some((x, v));
            }
            remaining -= dt;
        }
        None
    }

    // ── Derived parts ──────────────────────────────────────────

    /// Clip this part to `[begin, end]`, interpolating new endpoints.
    ///
    /// # Errors
    ///
    /// Fails if the range is empty or not contained in this part, or if
    /// the clipped part would be stalled.
    pub fn slice(&self, begin: f64, end: f64) -> Result<Self, EnvelopeError> {
        if !self.contains(begin) {
            return Err(self.out_of_range(begin));
        }
        if !self.contains(end) {
            return Err(self.out_of_range(end));
        }
        if end <= begin {
            return Err(EnvelopeError::NonIncreasing { index: 1 });
        }
        let mut positions = vec![begin];
        let mut speeds = vec![self.try_interpolate_speed(begin)?];
        for (&p, &v) in self.positions.iter().zip(&self.speeds) {
            if p > begin && p < end {
                positions.push(p);
                speeds.push(v);
            }
        }
        positions.push(end);
        speeds.push(self.try_interpolate_speed(end)?);
        Self::new(self.attitude, self.source, positions, speeds)
    }

    /// A copy with every speed multiplied by `factor`.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not a positive finite number.
    pub fn scaled(&self, factor: f64) -> Self {
        assert!(
            factor.is_finite() && factor > 0.0,
            "speed scale factor must be positive, got {factor}"
        );
        Self {
            attitude: self.attitude,
            source: self.source,
            positions: self.positions.clone(),
            speeds: self.speeds.iter().map(|v| v * factor).collect(),
            times: OnceLock::new(),
        }
    }

    // ── Internals ──────────────────────────────────────────────

    fn segment_speed(&self, index: usize, position: f64) -> f64 {
        let (p0, p1) = (self.positions[index], self.positions[index + 1]);
        let (s0, s1) = (self.speeds[index], self.speeds[index + 1]);
        if position == p0 {
            return s0;
        }
        if position == p1 {
            return s1;
        }
        s0 + (s1 - s0) * (position - p0) / (p1 - p0)
    }

    fn segment_acceleration(&self, index: usize) -> f64 {
        let dt = self.times()[index];
        (self.speeds[index + 1] - self.speeds[index]) / dt
    }

    fn out_of_range(&self, position: f64) -> EnvelopeError {
        EnvelopeError::OutOfRange {
            position,
            begin: self.begin_pos(),
            end: self.end_pos(),
        }
    }
}

/// Time to cross `dx` going from `v0` to `v1` at constant acceleration.
pub(crate) fn segment_time(dx: f64, v0: f64, v1: f64) -> f64 {
    dx / ((v0 + v1) / 2.0)
}

/// Time to cover `dx` from speed `v0` at constant acceleration `a`.
///
/// Solves `dx = v0·t + a·t²/2` in the form `2·dx / (v0 + sqrt(v0² + 2·a·dx))`,
/// which stays finite when `a` is zero.
pub(crate) fn time_to_cover(dx: f64, v0: f64, a: f64) -> f64 {
    if dx <= 0.0 {
        return 0.0;
    }
    let root = (v0 * v0 + 2.0 * a * dx).max(0.0).sqrt();
    let denominator = v0 + root;
    if denominator <= 0.0 {
        return 0.0;
    }
    2.0 * dx / denominator
}

fn validate_samples(positions: &[f64], speeds: &[f64]) -> Result<(), EnvelopeError> {
    if positions.len() != speeds.len() {
        return Err(EnvelopeError::LengthMismatch {
            positions: positions.len(),
            speeds: speeds.len(),
        });
    }
    if positions.len() < 2 {
        return Err(EnvelopeError::TooFewPoints {
            count: positions.len(),
        });
    }
    for (index, (&p, &v)) in positions.iter().zip(speeds).enumerate() {
        if !p.is_finite() {
            return Err(EnvelopeError::InvalidValue { index, value: p });
        }
        if !v.is_finite() || v < 0.0 {
            return Err(EnvelopeError::InvalidValue { index, value: v });
        }
        if index > 0 {
            if p <= positions[index - 1] {
                return Err(EnvelopeError::NonIncreasing { index });
            }
            if v == 0.0 && speeds[index - 1] == 0.0 {
                return Err(EnvelopeError::Stalled { index: index - 1 });
            }
        }
    }
    Ok(())
}

impl PartialEq for EnvelopePart {
    fn eq(&self, other: &Self) -> bool {
        self.attitude == other.attitude
            && self.source == other.source
            && self.positions == other.positions
            && self.speeds == other.speeds
    }
}

// Values are validated finite, so `==` is reflexive.
impl Eq for EnvelopePart {}

impl Hash for EnvelopePart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attitude.hash(state);
        self.source.hash(state);
        for value in self.positions.iter().chain(&self.speeds) {
            // -0.0 + 0.0 == +0.0, keeping hash consistent with ==.
            (value + 0.0).to_bits().hash(state);
        }
    }
}
