//! Railsim: a deterministic discrete-event railway simulation kernel.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! railsim sub-crates. For most users, adding `railsim` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use railsim::prelude::*;
//!
//! // One route over one 2 km section, ending at a buffer stop.
//! let mut builder = InfraBuilder::new();
//! let section = builder.add_section("S0").unwrap();
//! let signal = builder.add_signal("SIG0", AspectSet::ALL).unwrap();
//! builder
//!     .add_route("R0", &[(section, 2_000.0)], Some(signal), None)
//!     .unwrap();
//! let infra = Arc::new(builder.build().unwrap());
//!
//! let stock = RollingStock {
//!     id: "emu".into(),
//!     length: 200.0,
//!     mass: 400_000.0,
//!     inertia_coefficient: 1.05,
//!     max_speed: 44.0,
//!     rolling_resistance: RollingResistance { a: 1_000.0, b: 10.0, c: 3.0 },
//!     tractive_effort: TractiveEffortCurve::new([
//!         TractivePoint { speed: 0.0, force: 200_000.0 },
//!         TractivePoint { speed: 44.0, force: 80_000.0 },
//!     ]),
//!     service_deceleration: 0.6,
//! };
//! let schedule = TrainSchedule {
//!     name: "local".into(),
//!     rolling_stock: "emu".into(),
//!     departure_time: 0.0,
//!     initial_speed: 0.0,
//!     routes: vec!["R0".into()],
//!     stops: Vec::new(),
//!     speed_limits: Vec::new(),
//!     grades: Vec::new(),
//!     allowances: Vec::new(),
//! };
//!
//! let mut sim = Simulation::new(
//!     infra.clone(),
//!     &[stock],
//!     &[schedule],
//!     &[],
//!     SimulationConfig::default(),
//! )
//! .unwrap();
//! let log = ResultLog::new(infra);
//! sim.add_sink(Box::new(log.clone()));
//! sim.run().unwrap();
//!
//! let result = log.result();
//! result.validate().unwrap();
//! assert!(result.trains["local"].arrival_time.is_some());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `railsim-core` | IDs, the change union, sinks, error enums |
//! | [`envelope`] | `railsim-envelope` | Speed envelopes and envelope parts |
//! | [`physics`] | `railsim-physics` | Rolling stock, integration, envelope pipeline |
//! | [`infra`] | `railsim-infra` | Infrastructure graph and interlocking state |
//! | [`engine`] | `railsim-engine` | Event queue, simulation loop, sessions |
//! | [`replay`] | `railsim-replay` | Change log recording and verification |
//! | [`output`] | `railsim-output` | Result materialization and simplification |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`railsim-core`).
///
/// Contains the [`types::Change`] union, the [`types::ChangeSink`] trait,
/// and the load-time and run-time error enums.
pub use railsim_core as types;

/// Speed envelopes (`railsim-envelope`).
///
/// [`envelope::Envelope`] is a continuous, position-ordered chain of
/// [`envelope::EnvelopePart`]s.
pub use railsim_envelope as envelope;

/// Train physics (`railsim-physics`).
///
/// Rolling stock characteristics, the physics integrator, and the
/// [`physics::EnvelopePipeline`] producing nominal and scheduled envelopes.
pub use railsim_physics as physics;

/// Infrastructure and interlocking (`railsim-infra`).
///
/// Build an immutable [`infra::Infra`] with [`infra::InfraBuilder`]; the
/// mutable reservation state lives in [`infra::InfraState`].
pub use railsim_infra as infra;

/// Simulation engine (`railsim-engine`).
///
/// [`engine::Simulation`] runs a set of schedules to completion;
/// [`engine::Session`] wraps it for incremental, watched stepping.
pub use railsim_engine as engine;

/// Change log recording and verification (`railsim-replay`).
///
/// Record runs with [`replay::ReplaySink`], check a fresh run against a
/// log with [`replay::verify_stream`], and rebuild state with
/// [`replay::StateReplica`].
pub use railsim_replay as replay;

/// Result materialization (`railsim-output`).
///
/// [`output::ResultLog`] renders the published stream into a
/// [`output::SimulationResult`].
pub use railsim_output as output;

/// Common imports for typical railsim usage.
///
/// ```rust
/// use railsim::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use railsim_core::{
        Aspect, Change, ChangeEntry, ChangeKind, ChangeSink, RouteId, RouteStatus, SignalId,
        SimTime, TrainId, TrainStatus, TvdSectionId,
    };

    // Errors
    pub use railsim_core::{LoadError, SimulationError};

    // Physics
    pub use railsim_physics::{
        Allowance, AllowanceKind, GradeSection, PhysicsConfig, RollingResistance, RollingStock,
        SpeedLimit, TractiveEffortCurve, TractivePoint,
    };

    // Infrastructure
    pub use railsim_infra::{AspectSet, Infra, InfraBuilder, InfraState};

    // Engine
    pub use railsim_engine::{
        EventType, NamedSuccessionTable, ScheduledStop, Session, Simulation, SimulationConfig,
        TrainSchedule,
    };

    // Replay and output
    pub use railsim_output::{ResultLog, SimplifyTolerance, SimulationResult};
    pub use railsim_replay::{ReplayReader, ReplaySink, ReplayWriter};
}
