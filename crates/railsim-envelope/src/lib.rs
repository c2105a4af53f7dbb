//! Speed envelopes for the railsim simulation kernel.
//!
//! An [`Envelope`] is the speed-vs-position profile a train follows over
//! its path. It is an ordered, position-contiguous sequence of
//! [`EnvelopePart`]s, each a strictly increasing run of `(position,
//! speed)` samples tagged with an [`EnvelopeAttitude`] (what the driver
//! is doing) and an [`EnvelopeSource`] (why the part exists).
//!
//! Everything here is immutable once built. Queries outside a part's or
//! envelope's range are contract violations: the plain accessors panic,
//! the `try_*` variants return [`EnvelopeError`].
//!
//! [`SpeedDirective`] and [`Action`] are the per-position driving
//! vocabulary used by the physics engine when it integrates new parts.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod builder;
pub mod directive;
pub mod envelope;
pub mod error;
pub mod part;

pub use action::{Action, ActionKind};
pub use builder::EnvelopePartBuilder;
pub use directive::SpeedDirective;
pub use envelope::{Envelope, EnvelopeState};
pub use error::EnvelopeError;
pub use part::{EnvelopeAttitude, EnvelopePart, EnvelopeSource};

/// Two positions closer than this are the same point of the path.
pub const POSITION_EPSILON: f64 = 1e-6;

/// Two speeds closer than this are considered continuous.
pub const SPEED_EPSILON: f64 = 1e-6;
