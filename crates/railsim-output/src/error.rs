//! Error types for result materialization.

use thiserror::Error;

/// A rendered result that does not describe a complete run.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum OutputError {
    /// A train reached a different number of stops than scheduled.
    #[error("train '{train}': expected {expected} stops, got {reached}")]
    StopCountMismatch {
        /// Schedule name of the train.
        train: String,
        /// Number of scheduled stops.
        expected: usize,
        /// Number of stop reaches recorded.
        reached: usize,
    },
    /// A simplification tolerance is negative or not finite.
    #[error("invalid simplification tolerance {field} = {value}")]
    InvalidTolerance {
        /// Which tolerance.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}
