//! Train physics and the staged speed-envelope pipeline.
//!
//! Given a [`RollingStock`], a [`PhysicsPath`], static speed limits, and
//! the stops a train must make, the [`EnvelopePipeline`] derives the
//! [`Envelope`](railsim_envelope::Envelope) the train will follow:
//!
//! 1. [`mrsp`]: the most restrictive speed profile, the minimum of
//!    track and train limits at every position.
//! 2. [`max_speed`]: braking curves into every speed drop and stop.
//! 3. [`max_effort`]: acceleration curves out of every stop and speed
//!    rise, giving a physically realizable, speed-continuous envelope.
//! 4. [`allowance`]: scheduling margins, applied as one uniform speed
//!    scale factor.
//!
//! Integration is explicit and time-stepped; see [`integration`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allowance;
pub mod config;
pub mod error;
pub mod integration;
pub mod max_effort;
pub mod max_speed;
pub mod mrsp;
pub mod path;
pub mod pipeline;
pub mod rolling_stock;

pub use allowance::{Allowance, AllowanceKind, DISTANCE_ALLOWANCE_UNIT};
pub use config::PhysicsConfig;
pub use error::PhysicsError;
pub use integration::{IntegrationStep, TrainPhysicsIntegrator};
pub use mrsp::SpeedLimit;
pub use path::{FlatPath, GradeSection, GradedPath, PhysicsPath};
pub use pipeline::{EnvelopePipeline, EnvelopeRequest, TrainEnvelopes, REPLAN_SPEED_TOLERANCE};
pub use rolling_stock::{RollingResistance, RollingStock, TractiveEffortCurve, TractivePoint};

/// Standard gravity, in m/s².
pub const GRAVITY: f64 = 9.81;
