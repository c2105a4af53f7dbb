//! Envelope construction and query errors.

use thiserror::Error;

/// A violated envelope contract.
///
/// Returned by the fallible constructors and the `try_*` queries. The
/// panicking accessors report the same conditions through their panic
/// message.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EnvelopeError {
    /// A position query fell outside the covered range.
    #[error("position {position} is outside [{begin}, {end}]")]
    OutOfRange {
        /// The queried position.
        position: f64,
        /// First covered position.
        begin: f64,
        /// Last covered position.
        end: f64,
    },
    /// A time query fell outside `[0, total time]`.
    #[error("time {time} is outside [0, {total}]")]
    TimeOutOfRange {
        /// The queried time.
        time: f64,
        /// Total time of the envelope.
        total: f64,
    },
    /// A part needs at least two samples.
    #[error("an envelope part needs at least 2 points, got {count}")]
    TooFewPoints {
        /// Number of samples supplied.
        count: usize,
    },
    /// Position and speed arrays differ in length.
    #[error("{positions} positions but {speeds} speeds")]
    LengthMismatch {
        /// Number of positions.
        positions: usize,
        /// Number of speeds.
        speeds: usize,
    },
    /// Cached time deltas do not match the number of segments.
    #[error("{times} time deltas for {points} points")]
    TimesLengthMismatch {
        /// Number of time deltas.
        times: usize,
        /// Number of samples.
        points: usize,
    },
    /// Positions are not strictly increasing.
    #[error("position at index {index} does not increase")]
    NonIncreasing {
        /// Index of the offending sample.
        index: usize,
    },
    /// A position, speed, or time is NaN, infinite, or a negative speed.
    #[error("invalid value {value} at index {index}")]
    InvalidValue {
        /// Index of the offending sample.
        index: usize,
        /// The value.
        value: f64,
    },
    /// A segment has zero speed at both ends, so it takes forever.
    #[error("segment {index} has zero speed at both ends")]
    Stalled {
        /// Index of the segment's first sample.
        index: usize,
    },
    /// An envelope needs at least one part.
    #[error("an envelope needs at least one part")]
    Empty,
    /// Consecutive parts leave a gap or overlap.
    #[error("part {index} ends at {end} but the next part begins at {begin}")]
    NotContiguous {
        /// Index of the earlier part.
        index: usize,
        /// End position of the earlier part.
        end: f64,
        /// Begin position of the next part.
        begin: f64,
    },
    /// Consecutive parts disagree on the speed at their shared position.
    #[error("part {index} ends at speed {end_speed} but the next part begins at {begin_speed}")]
    SpeedDiscontinuity {
        /// Index of the earlier part.
        index: usize,
        /// End speed of the earlier part.
        end_speed: f64,
        /// Begin speed of the next part.
        begin_speed: f64,
    },
}
