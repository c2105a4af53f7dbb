//! Error types for the replay system.

use std::io;

use railsim_core::{LoadError, SimulationError};
use thiserror::Error;

/// Errors raised while recording, reading, comparing, or re-applying a
/// change log.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A line could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The first line is not a replay header.
    #[error("invalid replay header: {detail}")]
    InvalidHeader {
        /// What was wrong with it.
        detail: String,
    },
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the log.
        found: u8,
    },
    /// Two change streams disagree.
    #[error("change streams diverge at seq {seq}: {detail}")]
    Divergence {
        /// First sequence number at which the streams differ.
        seq: u64,
        /// Human-readable description of the difference.
        detail: String,
    },
    /// The interlocking of a replica cannot be built.
    #[error("invalid infrastructure: {0}")]
    Infra(#[from] LoadError),
    /// A recorded change cannot be applied to the replica.
    #[error("cannot apply change {seq}: {source}")]
    Apply {
        /// Sequence number of the rejected change.
        seq: u64,
        /// Why the interlocking refused it.
        source: SimulationError,
    },
}
