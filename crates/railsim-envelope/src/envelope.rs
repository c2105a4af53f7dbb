//! Position-contiguous sequences of envelope parts.

use std::sync::OnceLock;

use crate::error::EnvelopeError;
use crate::part::EnvelopePart;
use crate::{POSITION_EPSILON, SPEED_EPSILON};

/// Head position and speed at some instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeState {
    /// Position along the path.
    pub position: f64,
    /// Speed at that position.
    pub speed: f64,
}

// ── Envelope ────────────────────────────────────────────────────

/// The speed profile over a whole path.
///
/// Parts are ordered and contiguous: each part begins where the previous
/// one ends. Unless built with
/// [`new_discontinuous`](Envelope::new_discontinuous), speed is also
/// continuous across part boundaries. A position shared by two parts
/// belongs to the lower one.
///
/// Lookup is a binary search over parts followed by a binary search over
/// the located part's samples.
#[derive(Clone, Debug)]
pub struct Envelope {
    parts: Vec<EnvelopePart>,
    continuous: bool,
    part_start_times: OnceLock<Vec<f64>>,
}

impl Envelope {
    /// Build a speed-continuous envelope.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Empty`], [`EnvelopeError::NotContiguous`], or
    /// [`EnvelopeError::SpeedDiscontinuity`].
    pub fn new(parts: Vec<EnvelopePart>) -> Result<Self, EnvelopeError> {
        check_contiguous(&parts)?;
        check_speed_continuous(&parts)?;
        Ok(Self::from_checked(parts, true))
    }

    /// Build an envelope allowed to jump in speed between parts.
    ///
    /// Used for speed ceilings such as the most restrictive speed profile,
    /// which change abruptly at limit boundaries.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Empty`] or [`EnvelopeError::NotContiguous`].
    pub fn new_discontinuous(parts: Vec<EnvelopePart>) -> Result<Self, EnvelopeError> {
        check_contiguous(&parts)?;
        Ok(Self::from_checked(parts, false))
    }

    fn from_checked(parts: Vec<EnvelopePart>, continuous: bool) -> Self {
        Self {
            parts,
            continuous,
            part_start_times: OnceLock::new(),
        }
    }

    /// Re-check this envelope as speed-continuous.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::SpeedDiscontinuity`] at the first speed jump.
    pub fn into_continuous(self) -> Result<Self, EnvelopeError> {
        if self.continuous {
            return Ok(self);
        }
        check_speed_continuous(&self.parts)?;
        Ok(Self::from_checked(self.parts, true))
    }

    /// Whether speed continuity was enforced at construction.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// The parts, in position order.
    pub fn parts(&self) -> &[EnvelopePart] {
        &self.parts
    }

    /// Consume the envelope, returning its parts.
    pub fn into_parts(self) -> Vec<EnvelopePart> {
        self.parts
    }

    /// Number of parts.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// First covered position.
    pub fn begin(&self) -> f64 {
        self.parts[0].begin_pos()
    }

    /// Last covered position.
    pub fn end(&self) -> f64 {
        self.parts[self.parts.len() - 1].end_pos()
    }

    /// Covered distance.
    pub fn length(&self) -> f64 {
        self.end() - self.begin()
    }

    /// Speed at the first position.
    pub fn begin_speed(&self) -> f64 {
        self.parts[0].begin_speed()
    }

    /// Speed at the last position.
    pub fn end_speed(&self) -> f64 {
        self.parts[self.parts.len() - 1].end_speed()
    }

    /// Highest speed anywhere on the envelope.
    pub fn max_speed(&self) -> f64 {
        self.parts
            .iter()
            .map(EnvelopePart::max_speed)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the part containing `position`, or `None` if out of range.
    ///
    /// A position on the boundary between two parts resolves to the
    /// lower one. Positions up to [`POSITION_EPSILON`] outside
    /// `[begin, end]` resolve to the first or last part.
    pub fn find_part(&self, position: f64) -> Option<usize> {
        if position < self.begin() - POSITION_EPSILON || position > self.end() + POSITION_EPSILON
        {
            return None;
        }
        let index = self.parts.partition_point(|p| p.end_pos() < position);
        Some(index.min(self.parts.len() - 1))
    }

    fn locate(&self, position: f64) -> Result<(&EnvelopePart, f64), EnvelopeError> {
        let index = self.find_part(position).ok_or(EnvelopeError::OutOfRange {
            position,
            begin: self.begin(),
            end: self.end(),
        })?;
        let part = &self.parts[index];
        Ok((part, position.clamp(part.begin_pos(), part.end_pos())))
    }

    // ── Speed ──────────────────────────────────────────────────

    /// Speed at `position`.
    ///
    /// Positions up to [`POSITION_EPSILON`] outside `[begin, end]` are
    /// clamped to the nearest end, so accumulated rounding at a path end
    /// still reads the end speed.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] further than [`POSITION_EPSILON`]
    /// outside `[begin, end]`.
    pub fn try_interpolate_speed(&self, position: f64) -> Result<f64, EnvelopeError> {
        let (part, position) = self.locate(position)?;
        part.try_interpolate_speed(position)
    }

    /// Panicking variant of [`try_interpolate_speed`](Self::try_interpolate_speed).
    ///
    /// # Panics
    ///
    /// Panics where [`try_interpolate_speed`](Self::try_interpolate_speed)
    /// errors.
    pub fn interpolate_speed(&self, position: f64) -> f64 {
        match self.try_interpolate_speed(position) {
            Ok(speed) => speed,
            Err(e) => panic!("{e}"),
        }
    }

    // ── Time ───────────────────────────────────────────────────

    fn part_start_times(&self) -> &[f64] {
        self.part_start_times.get_or_init(|| {
            let mut acc = 0.0;
            self.parts
                .iter()
                .map(|p| {
                    let start = acc;
                    acc += p.total_time();
                    start
                })
                .collect()
        })
    }

    /// Time needed to run the whole envelope.
    pub fn total_time(&self) -> f64 {
        let last = self.parts.len() - 1;
        self.part_start_times()[last] + self.parts[last].total_time()
    }

    /// Time needed to travel from `begin` to `position`, with the same
    /// end tolerance as [`try_interpolate_speed`](Self::try_interpolate_speed).
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] further than [`POSITION_EPSILON`]
    /// outside `[begin, end]`.
    pub fn time_at(&self, position: f64) -> Result<f64, EnvelopeError> {
        let index = self.find_part(position).ok_or(EnvelopeError::OutOfRange {
            position,
            begin: self.begin(),
            end: self.end(),
        })?;
        let part = &self.parts[index];
        let clamped = position.clamp(part.begin_pos(), part.end_pos());
        Ok(self.part_start_times()[index] + part.time_at(clamped)?)
    }

    /// Position and speed reached `time` seconds after leaving `begin`.
    ///
    /// Within a segment the train accelerates uniformly in time, so
    /// `time_at(state_at_time(t).position) == t` up to rounding.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::TimeOutOfRange`] if `time` is negative or exceeds
    /// [`total_time`](Self::total_time).
    pub fn state_at_time(&self, time: f64) -> Result<EnvelopeState, EnvelopeError> {
        let total = self.total_time();
        if !(0.0..=total + 1e-9).contains(&time) {
            return Err(EnvelopeError::TimeOutOfRange { time, total });
        }
        let starts = self.part_start_times();
        let index = starts.partition_point(|s| *s <= time).saturating_sub(1);
        let part = &self.parts[index];
        let (position, speed) = part
            .state_after(time - starts[index])
            .unwrap_or((part.end_pos(), part.end_speed()));
        Ok(EnvelopeState { position, speed })
    }

    // ── Composition ────────────────────────────────────────────

    /// Replace the range covered by `part` with `part` itself.
    ///
    /// Parts straddling either end of the range are sliced. The result
    /// keeps this envelope's continuity mode, so overlaying onto a
    /// continuous envelope must meet its speeds at both ends.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] if `part` extends past the envelope,
    /// or any contiguity / continuity failure of the result.
    pub fn overlay(&self, part: EnvelopePart) -> Result<Self, EnvelopeError> {
        let (begin, end) = (part.begin_pos(), part.end_pos());
        if begin < self.begin() - POSITION_EPSILON || end > self.end() + POSITION_EPSILON {
            return Err(EnvelopeError::OutOfRange {
                position: if begin < self.begin() { begin } else { end },
                begin: self.begin(),
                end: self.end(),
            });
        }

        let mut parts = Vec::with_capacity(self.parts.len() + 2);
        for existing in &self.parts {
            if existing.end_pos() <= begin + POSITION_EPSILON {
                parts.push(existing.clone());
            } else if existing.begin_pos() < begin - POSITION_EPSILON {
                parts.push(existing.slice(existing.begin_pos(), begin)?);
            }
        }
        parts.push(part);
        for existing in &self.parts {
            if existing.begin_pos() >= end - POSITION_EPSILON {
                parts.push(existing.clone());
            } else if existing.end_pos() > end + POSITION_EPSILON {
                parts.push(existing.slice(end, existing.end_pos())?);
            }
        }

        if self.continuous {
            Self::new(parts)
        } else {
            Self::new_discontinuous(parts)
        }
    }

    /// A copy with every speed multiplied by `factor`.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not a positive finite number.
    pub fn scaled(&self, factor: f64) -> Self {
        let parts = self.parts.iter().map(|p| p.scaled(factor)).collect();
        Self::from_checked(parts, self.continuous)
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.continuous == other.continuous && self.parts == other.parts
    }
}

fn check_contiguous(parts: &[EnvelopePart]) -> Result<(), EnvelopeError> {
    if parts.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    for (index, pair) in parts.windows(2).enumerate() {
        let (end, begin) = (pair[0].end_pos(), pair[1].begin_pos());
        if (end - begin).abs() > POSITION_EPSILON {
            return Err(EnvelopeError::NotContiguous { index, end, begin });
        }
    }
    Ok(())
}

fn check_speed_continuous(parts: &[EnvelopePart]) -> Result<(), EnvelopeError> {
    for (index, pair) in parts.windows(2).enumerate() {
        let (end_speed, begin_speed) = (pair[0].end_speed(), pair[1].begin_speed());
        if (end_speed - begin_speed).abs() > SPEED_EPSILON {
            return Err(EnvelopeError::SpeedDiscontinuity {
                index,
                end_speed,
                begin_speed,
            });
        }
    }
    Ok(())
}
