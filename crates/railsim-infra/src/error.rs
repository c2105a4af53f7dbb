//! Why the interlocking refused a route.

use railsim_core::{RouteId, RouteStatus, TrainId, TvdSectionId};
use thiserror::Error;

/// A route reservation request that cannot be granted right now.
///
/// Denial never mutates interlocking state. It is not a simulation
/// failure: the requesting train waits and the request is retried when
/// the blocking resource is released.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReservationDenied {
    /// The route does not exist.
    #[error("unknown {route}")]
    UnknownRoute {
        /// The requested handle.
        route: RouteId,
    },
    /// The route itself is held.
    #[error("{route} is {status:?}")]
    RouteBusy {
        /// The requested route.
        route: RouteId,
        /// Its current status.
        status: RouteStatus,
    },
    /// A section of the route is held by a conflicting route.
    #[error("{section} is held by {holder}")]
    SectionHeld {
        /// The contested section.
        section: TvdSectionId,
        /// The route holding it.
        holder: RouteId,
    },
    /// A section is still occupied by another train.
    #[error("{section} is occupied by {train}")]
    SectionOccupied {
        /// The occupied section.
        section: TvdSectionId,
        /// The occupying train.
        train: TrainId,
    },
    /// A succession table gives priority to another train.
    #[error("{section} is promised to {expected} first")]
    SuccessionOrder {
        /// The section with the succession table.
        section: TvdSectionId,
        /// The train whose turn it is.
        expected: TrainId,
    },
}
