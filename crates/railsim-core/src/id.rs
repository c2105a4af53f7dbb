//! Strongly-typed handles and the [`SimTime`] type alias.
//!
//! Infrastructure entities live in flat arenas owned by the infra graph;
//! every cross-reference between routes, TVD sections, and signals is one
//! of these integer handles rather than a pointer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time, in seconds since the simulation epoch.
pub type SimTime = f64;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// The handle as a `usize` index into its owning arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }
    };
}

arena_id!(
    /// Identifies a train within one simulation run.
    ///
    /// `TrainId(n)` is the n-th schedule handed to the simulation.
    TrainId(u32),
    "train"
);

arena_id!(
    /// Identifies a route in the infrastructure graph.
    RouteId(u32),
    "route"
);

arena_id!(
    /// Identifies a track vacancy detection section.
    TvdSectionId(u32),
    "tvd section"
);

arena_id!(
    /// Identifies a signal in the infrastructure graph.
    SignalId(u32),
    "signal"
);

arena_id!(
    /// Identifies a timeline event.
    ///
    /// Allocated from a per-simulation monotonic counter, so the id also
    /// records the order in which events were submitted.
    EventId(u64),
    "event"
);

arena_id!(
    /// Position of a change in the simulation's change log.
    ///
    /// Assigned when the change is registered; published changes keep
    /// their registration sequence, so the published stream is ordered
    /// by `ChangeSeq`.
    ChangeSeq(u64),
    "change"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_entity() {
        assert_eq!(TrainId(3).to_string(), "train 3");
        assert_eq!(RouteId(0).to_string(), "route 0");
        assert_eq!(TvdSectionId(7).to_string(), "tvd section 7");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&SignalId(12)).unwrap();
        assert_eq!(json, "12");
        let back: SignalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SignalId(12));
    }

    #[test]
    fn index_matches_inner_value() {
        assert_eq!(RouteId(5).index(), 5);
        assert_eq!(EventId::from(9u64).index(), 9);
    }
}
