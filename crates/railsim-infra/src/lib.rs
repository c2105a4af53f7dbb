//! Infrastructure graph and interlocking state for railsim.
//!
//! The static half is the [`Infra`] graph: TVD sections, routes, and
//! signals, each stored in a flat arena and referenced by integer
//! handle ([`TvdSectionId`], [`RouteId`], [`SignalId`]). It is built
//! once through [`InfraBuilder`] and never mutated.
//!
//! The mutable half is [`InfraState`], the interlocking. It owns the
//! status of every route, the occupancy of every TVD section, and the
//! aspect of every signal. Every mutation is reported as a
//! [`Change`](railsim_core::Change) through a
//! [`ChangeRecorder`](railsim_core::ChangeRecorder); the crate performs
//! no I/O.
//!
//! [`TvdSectionId`]: railsim_core::TvdSectionId
//! [`RouteId`]: railsim_core::RouteId
//! [`SignalId`]: railsim_core::SignalId

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod aspect;
pub mod builder;
pub mod error;
pub mod graph;
pub mod state;
pub mod succession;

pub use aspect::AspectSet;
pub use builder::InfraBuilder;
pub use error::ReservationDenied;
pub use graph::{Infra, Route, Signal, TvdSection, TvdSectionPath};
pub use state::{InfraState, RouteRequest, RouteRequestOutcome, RouteState, SectionState};
pub use succession::SuccessionTable;
