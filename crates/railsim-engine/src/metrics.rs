//! Run counters for the simulation kernel.
//!
//! [`SimulationStats`] accumulates over a whole run. The kernel updates
//! it while resolving events; callers read it through
//! [`Simulation::stats`](crate::Simulation::stats).

use serde::Serialize;

/// Cumulative counters of one simulation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Events resolved by `step()`.
    pub events_resolved: u64,
    /// Events cancelled before they happened.
    pub events_cancelled: u64,
    /// Changes delivered to sinks.
    pub changes_published: u64,
    /// Envelope pipeline runs, nominal and per leg.
    pub envelope_computations: u64,
    /// Route requests granted, immediately or from the waiting list.
    pub route_grants: u64,
    /// Route requests that had to wait.
    pub route_denials: u64,
}
