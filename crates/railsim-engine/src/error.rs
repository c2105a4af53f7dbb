//! Errors raised while building or driving a simulation.

use railsim_core::{LoadError, SimulationError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionState;

/// Why a [`Simulation`](crate::Simulation) could not be built.
///
/// No simulation state exists when one of these is returned.
#[derive(Debug, PartialEq, Error)]
pub enum SetupError {
    /// The configuration does not validate.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Rolling stock, schedules, or succession tables are inconsistent.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors of the interactive [`Session`](crate::Session) surface.
#[derive(Debug, PartialEq, Error)]
pub enum SessionError {
    /// The operation is not allowed in the current session state.
    #[error("expected session state {expected:?}, got {got:?}")]
    UnexpectedState {
        /// State the operation requires.
        expected: SessionState,
        /// State the session is in.
        got: SessionState,
    },
    /// Building the simulation failed.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The run failed; the session is back to `Initialized`.
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
