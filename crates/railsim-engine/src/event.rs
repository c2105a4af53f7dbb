//! Timeline events: what can happen to a train, and when.

use railsim_core::{EventId, SimTime, TrainId};
use serde::{Deserialize, Serialize};

/// What happens when an event is resolved.
///
/// Section indices refer to [`TrainPlan::sections`](crate::TrainPlan::sections),
/// stop indices to [`TrainPlan::stops`](crate::TrainPlan::stops).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// The train enters the simulation and asks for its first route.
    Departure,
    /// The head crosses into a TVD section.
    HeadEnters {
        /// Index of the section along the train's path.
        section_index: usize,
    },
    /// The tail clears a TVD section.
    TailLeaves {
        /// Index of the section along the train's path.
        section_index: usize,
    },
    /// The train comes to a halt at a scheduled stop.
    StopReached {
        /// Index of the stop in the schedule.
        stop_index: usize,
    },
    /// The dwell at a stop is over.
    Restart {
        /// Index of the stop being left.
        stop_index: usize,
    },
    /// The train halts at the end of its movement authority.
    AuthorityEnd,
    /// The head reaches the end of the path.
    Arrival,
}

/// Fieldless discriminant of [`EventKind`], used by `run_until`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// [`EventKind::Departure`].
    Departure,
    /// [`EventKind::HeadEnters`].
    HeadEnters,
    /// [`EventKind::TailLeaves`].
    TailLeaves,
    /// [`EventKind::StopReached`].
    StopReached,
    /// [`EventKind::Restart`].
    Restart,
    /// [`EventKind::AuthorityEnd`].
    AuthorityEnd,
    /// [`EventKind::Arrival`].
    Arrival,
}

impl EventKind {
    /// The fieldless type of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Departure => EventType::Departure,
            Self::HeadEnters { .. } => EventType::HeadEnters,
            Self::TailLeaves { .. } => EventType::TailLeaves,
            Self::StopReached { .. } => EventType::StopReached,
            Self::Restart { .. } => EventType::Restart,
            Self::AuthorityEnd => EventType::AuthorityEnd,
            Self::Arrival => EventType::Arrival,
        }
    }
}

/// Lifecycle of a [`TimelineEvent`].
///
/// `Unregistered → Scheduled → (Happened | Cancelled)`; both terminal
/// states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventState {
    /// Built but not in a queue.
    Unregistered,
    /// Waiting in the queue.
    Scheduled,
    /// Resolved.
    Happened,
    /// Removed before resolution.
    Cancelled,
}

impl EventState {
    /// Whether `self → next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: EventState) -> bool {
        matches!(
            (self, next),
            (Self::Unregistered, Self::Scheduled)
                | (Self::Scheduled, Self::Happened)
                | (Self::Scheduled, Self::Cancelled)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Happened | Self::Cancelled)
    }
}

/// A scheduled occurrence owned by one train.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Queue-assigned handle; also the tie-break among equal times.
    pub id: EventId,
    /// Simulated time of the occurrence.
    pub time: SimTime,
    /// The owning train.
    pub train: TrainId,
    /// What happens.
    pub kind: EventKind,
    /// Lifecycle position.
    pub state: EventState,
}

impl TimelineEvent {
    /// The fieldless type of this event.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}
