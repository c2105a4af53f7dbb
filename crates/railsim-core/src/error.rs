//! Error types shared across the railsim workspace.
//!
//! Split by when they can occur: [`LoadError`] before any simulation
//! state exists, [`SimulationError`] while a run is in progress. Neither
//! is retried by the kernel; both report a definitive problem with the
//! inputs of the run.

use thiserror::Error;

use crate::id::{RouteId, TrainId};

/// Inconsistent inputs detected while assembling a simulation.
///
/// No partial simulation state is created when one of these is returned.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LoadError {
    /// A rolling stock definition is unusable or unknown.
    #[error("invalid rolling stock '{id}': {reason}")]
    InvalidRollingStock {
        /// Rolling stock identifier.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A train schedule is inconsistent with the infrastructure or itself.
    #[error("invalid schedule for train '{train}': {reason}")]
    InvalidSchedule {
        /// Schedule identifier.
        train: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A succession table references unknown entities or repeats trains.
    #[error("invalid succession table for section '{section}': {reason}")]
    InvalidSuccession {
        /// TVD section the table applies to.
        section: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The infrastructure graph is malformed.
    #[error("invalid infrastructure: {reason}")]
    InvalidInfra {
        /// What is wrong with it.
        reason: String,
    },
}

/// A fatal failure of an in-progress run.
///
/// Changes published before the failure stay valid; no further events
/// are resolved.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SimulationError {
    /// The physics engine could not build a realizable envelope.
    #[error("{train}: impossible envelope: {reason}")]
    Physics {
        /// The train whose envelope failed.
        train: TrainId,
        /// Description of the physics failure.
        reason: String,
    },
    /// A train reached a different number of stops than scheduled.
    #[error("{train}: expected {expected} stops, reached {reached}")]
    StopCountMismatch {
        /// The train.
        train: TrainId,
        /// Stops in the schedule.
        expected: usize,
        /// Stops actually reached.
        reached: usize,
    },
    /// The interlocking state machine was asked to do something illegal.
    #[error("{route}: interlocking violation: {reason}")]
    InterlockingViolation {
        /// The route involved.
        route: RouteId,
        /// Description of the violation.
        reason: String,
    },
    /// The event queue is empty but some trains never finished.
    #[error("deadlock: {} train(s) waiting with no pending events", waiting.len())]
    Deadlock {
        /// Trains still waiting for a route.
        waiting: Vec<TrainId>,
    },
    /// The run already failed; no further events are processed.
    #[error("simulation aborted by an earlier error")]
    Aborted,
}
