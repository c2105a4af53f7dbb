//! Result materialization for railsim runs.
//!
//! A [`ResultLog`] is a change sink that renders the published stream of
//! a run into a [`SimulationResult`]: per-train head and tail positions,
//! speeds, and stop reaches, plus route status and signal aspect
//! transitions. Results can be checked against the expected stop counts
//! with [`SimulationResult::validate`] and thinned for transport with
//! [`SimulationResult::simplify`], built on the generic [`rdp`] routine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod log;
pub mod result;
pub mod simplify;

pub use error::OutputError;
pub use log::ResultLog;
pub use result::{
    ResultPosition, ResultRouteStatus, ResultSignalChange, ResultSpeed, ResultStopReach,
    ResultTrain, SimulationResult,
};
pub use simplify::{rdp, SimplifyTolerance};
