//! Incremental construction of [`EnvelopePart`]s by integration.

use crate::error::EnvelopeError;
use crate::part::{EnvelopeAttitude, EnvelopePart, EnvelopeSource};

/// Accumulates samples produced by a physics integrator.
///
/// A forward builder expects strictly increasing positions. A backward
/// builder ([`new_backward`](Self::new_backward)) expects strictly
/// decreasing positions, as produced when a braking curve is integrated
/// upstream from its target, and reverses them on [`build`](Self::build).
/// Adding a point identical to the last one is a no-op.
#[derive(Clone, Debug)]
pub struct EnvelopePartBuilder {
    attitude: EnvelopeAttitude,
    source: EnvelopeSource,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    backward: bool,
}

impl EnvelopePartBuilder {
    /// A builder for samples in increasing position order.
    pub fn new(attitude: EnvelopeAttitude, source: EnvelopeSource) -> Self {
        Self {
            attitude,
            source,
            positions: Vec::new(),
            speeds: Vec::new(),
            backward: false,
        }
    }

    /// A builder for samples in decreasing position order.
    pub fn new_backward(attitude: EnvelopeAttitude, source: EnvelopeSource) -> Self {
        Self {
            backward: true,
            ..Self::new(attitude, source)
        }
    }

    /// Append one sample.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::NonIncreasing`] if the position does not move in
    /// the builder's direction.
    pub fn add(&mut self, position: f64, speed: f64) -> Result<(), EnvelopeError> {
        if let Some((&last_pos, &last_speed)) = self.positions.last().zip(self.speeds.last()) {
            if last_pos == position && last_speed == speed {
                return Ok(());
            }
            let advances = if self.backward {
                position < last_pos
            } else {
                position > last_pos
            };
            if !advances {
                return Err(EnvelopeError::NonIncreasing {
                    index: self.positions.len(),
                });
            }
        }
        self.positions.push(position);
        self.speeds.push(speed);
        Ok(())
    }

    /// Number of samples added so far.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no sample was added yet.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The most recently added sample.
    pub fn last(&self) -> Option<(f64, f64)> {
        self.positions.last().copied().zip(self.speeds.last().copied())
    }

    /// Finish the part.
    ///
    /// # Errors
    ///
    /// Any [`EnvelopePart::new`] validation failure.
    pub fn build(mut self) -> Result<EnvelopePart, EnvelopeError> {
        if self.backward {
            self.positions.reverse();
            self.speeds.reverse();
        }
        EnvelopePart::new(self.attitude, self.source, self.positions, self.speeds)
    }
}
