//! Discrete-event simulation kernel for railsim.
//!
//! A [`Simulation`] owns everything one run mutates: the [`EventQueue`],
//! the interlocking ([`InfraState`](railsim_infra::InfraState)), the
//! trains, and the [`ChangeLog`] with its registered sinks. Each
//! [`step`](Simulation::step) resolves exactly one
//! [`TimelineEvent`], the earliest pending one (ties in submission
//! order), and publishes the changes it produced before returning.
//!
//! Train movement is planned leg by leg through the physics
//! [`EnvelopePipeline`](railsim_physics::EnvelopePipeline): a leg ends
//! at the next stop, the end of the train's movement authority, or the
//! end of its path. Section boundary crossings, stop arrivals, and
//! restarts become events; a leg's pending events are cancelled when
//! the authority changes and the leg is replanned.
//!
//! [`Session`] wraps a simulation in the interactive control surface.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod changelog;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod queue;
pub mod schedule;
pub mod session;
pub mod simulation;
pub mod train;

pub use changelog::ChangeLog;
pub use config::{ConfigError, SimulationConfig};
pub use error::{SessionError, SetupError};
pub use event::{EventKind, EventState, EventType, TimelineEvent};
pub use metrics::SimulationStats;
pub use queue::EventQueue;
pub use schedule::{NamedSuccessionTable, ScheduledStop, TrainPlan, TrainSchedule};
pub use session::{Session, SessionState};
pub use simulation::Simulation;
pub use train::{Halt, Leg, Train};
