//! Core types and traits for the railsim simulation kernel.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other railsim crate: strongly-typed
//! handles into the infrastructure arenas, the closed [`Change`] union
//! describing every state mutation, the [`ChangeSink`] and
//! [`ChangeRecorder`] traits, and the load-time / run-time error enums.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod change;
pub mod error;
pub mod id;
pub mod traits;

pub use change::{
    Aspect, Change, ChangeEntry, ChangeKind, ChangeState, RouteStatus, RouteStatusChange,
    SignalAspectChange, StopReachedChange, TrainCreatedChange, TrainLegChange, TrainStateChange,
    TrainStatus, TvdOccupancyChange,
};
pub use error::{LoadError, SimulationError};
pub use id::{ChangeSeq, EventId, RouteId, SignalId, SimTime, TrainId, TvdSectionId};
pub use traits::{ChangeRecorder, ChangeSink};
