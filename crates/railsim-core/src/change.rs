//! The closed set of state mutations a simulation can publish.
//!
//! Every mutation of route, TVD section, signal, or train state is
//! expressed as a [`Change`]. Changes are registered while an event is
//! being resolved and published, in registration order, when the event
//! completes. Sinks match exhaustively on the enum, so adding a variant
//! forces every consumer to handle it.

use serde::{Deserialize, Serialize};

use crate::id::{ChangeSeq, RouteId, SignalId, SimTime, TrainId, TvdSectionId};

// ── RouteStatus ─────────────────────────────────────────────────

/// Reservation status of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteStatus {
    /// No train holds the route.
    Free,
    /// A train has been granted the route but has not entered it.
    Reserved,
    /// The holding train's head has entered the route's first section.
    Occupied,
}

impl RouteStatus {
    /// Whether the interlocking allows moving from `self` to `next`.
    ///
    /// The legal cycle is `Free → Reserved → Occupied → Free`, plus the
    /// `Reserved → Free` cancellation. Self-transitions are illegal.
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        matches!(
            (self, next),
            (Self::Free, Self::Reserved)
                | (Self::Reserved, Self::Occupied)
                | (Self::Reserved, Self::Free)
                | (Self::Occupied, Self::Free)
        )
    }
}

// ── Aspect ──────────────────────────────────────────────────────

/// Indication shown by a signal.
///
/// Ordered from most to least restrictive, so `min` picks the safer one.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Aspect {
    /// Stop before the signal.
    Stop,
    /// Proceed, prepared to stop at the next signal.
    Warning,
    /// Proceed.
    Clear,
}

// ── TrainStatus ─────────────────────────────────────────────────

/// Coarse movement status reported in [`TrainStateChange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainStatus {
    /// Created, first route not yet granted.
    Starting,
    /// Following a planned leg.
    Running,
    /// Standing at a scheduled stop.
    Stopped,
    /// Standing at the end of its movement authority.
    WaitingForRoute,
    /// Reached the end of its path.
    Arrived,
}

// ── Change payloads ─────────────────────────────────────────────

/// A train entered the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainCreatedChange {
    /// The new train.
    pub train: TrainId,
    /// Schedule identifier of the train.
    pub name: String,
    /// Length of the train's path.
    pub path_length: f64,
    /// Length of the train itself.
    pub train_length: f64,
    /// Simulated time the train was scheduled to depart.
    pub departure_time: SimTime,
    /// Speed at departure.
    pub initial_speed: f64,
    /// Number of scheduled stops.
    pub stop_count: usize,
}

/// A train's head position, speed, and status at an event boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainStateChange {
    /// The train.
    pub train: TrainId,
    /// Head position along the path.
    pub position: f64,
    /// Current speed.
    pub speed: f64,
    /// Status after the update.
    pub status: TrainStatus,
}

/// A freshly planned movement leg.
///
/// `times` are absolute simulated times, one per position sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainLegChange {
    /// The train.
    pub train: TrainId,
    /// Head positions along the path.
    pub positions: Vec<f64>,
    /// Speed at each position.
    pub speeds: Vec<f64>,
    /// Time at which each position is reached.
    pub times: Vec<SimTime>,
}

/// A train stopped at one of its scheduled stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopReachedChange {
    /// The train.
    pub train: TrainId,
    /// Index of the stop in the train's schedule.
    pub stop_index: usize,
    /// Position of the stop along the path.
    pub position: f64,
}

/// A route moved through its state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStatusChange {
    /// The route.
    pub route: RouteId,
    /// Status before the change.
    pub from: RouteStatus,
    /// Status after the change.
    pub to: RouteStatus,
    /// Train holding the route after the change (`None` once freed).
    pub train: Option<TrainId>,
}

/// A TVD section became occupied or vacant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TvdOccupancyChange {
    /// The section.
    pub section: TvdSectionId,
    /// The train entering or leaving.
    pub train: TrainId,
    /// `true` when the train's head entered, `false` when its tail cleared.
    pub occupied: bool,
}

/// A signal's displayed aspect changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalAspectChange {
    /// The signal.
    pub signal: SignalId,
    /// Aspect before the change.
    pub from: Aspect,
    /// Aspect after the change.
    pub to: Aspect,
}

// ── Change ──────────────────────────────────────────────────────

/// One atomic, replayable state mutation.
///
/// # Examples
///
/// ```
/// use railsim_core::{Change, ChangeKind, RouteId, RouteStatus, RouteStatusChange, TrainId};
///
/// let change = Change::RouteStatus(RouteStatusChange {
///     route: RouteId(0),
///     from: RouteStatus::Free,
///     to: RouteStatus::Reserved,
///     train: Some(TrainId(1)),
/// });
/// assert_eq!(change.kind(), ChangeKind::RouteStatus);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Change {
    /// See [`TrainCreatedChange`].
    TrainCreated(TrainCreatedChange),
    /// See [`TrainStateChange`].
    TrainState(TrainStateChange),
    /// See [`TrainLegChange`].
    TrainLeg(TrainLegChange),
    /// See [`StopReachedChange`].
    StopReached(StopReachedChange),
    /// See [`RouteStatusChange`].
    RouteStatus(RouteStatusChange),
    /// See [`TvdOccupancyChange`].
    TvdOccupancy(TvdOccupancyChange),
    /// See [`SignalAspectChange`].
    SignalAspect(SignalAspectChange),
}

/// Fieldless discriminant of [`Change`], used for watch filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    /// [`Change::TrainCreated`].
    TrainCreated,
    /// [`Change::TrainState`].
    TrainState,
    /// [`Change::TrainLeg`].
    TrainLeg,
    /// [`Change::StopReached`].
    StopReached,
    /// [`Change::RouteStatus`].
    RouteStatus,
    /// [`Change::TvdOccupancy`].
    TvdOccupancy,
    /// [`Change::SignalAspect`].
    SignalAspect,
}

impl Change {
    /// The fieldless kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::TrainCreated(_) => ChangeKind::TrainCreated,
            Self::TrainState(_) => ChangeKind::TrainState,
            Self::TrainLeg(_) => ChangeKind::TrainLeg,
            Self::StopReached(_) => ChangeKind::StopReached,
            Self::RouteStatus(_) => ChangeKind::RouteStatus,
            Self::TvdOccupancy(_) => ChangeKind::TvdOccupancy,
            Self::SignalAspect(_) => ChangeKind::SignalAspect,
        }
    }

    /// The train this change concerns, if any.
    pub fn train(&self) -> Option<TrainId> {
        match self {
            Self::TrainCreated(c) => Some(c.train),
            Self::TrainState(c) => Some(c.train),
            Self::TrainLeg(c) => Some(c.train),
            Self::StopReached(c) => Some(c.train),
            Self::TvdOccupancy(c) => Some(c.train),
            Self::RouteStatus(c) => c.train,
            Self::SignalAspect(_) => None,
        }
    }

    /// Whether this change mutates infrastructure (route, TVD, signal) state.
    pub fn is_infra(&self) -> bool {
        matches!(
            self,
            Self::RouteStatus(_) | Self::TvdOccupancy(_) | Self::SignalAspect(_)
        )
    }
}

// ── ChangeState / ChangeEntry ───────────────────────────────────

/// Lifecycle of a change inside the change log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeState {
    /// Constructed, not yet known to the simulation.
    Unregistered,
    /// Accepted into the pending set of the event being resolved.
    Registered,
    /// Delivered to sinks; final and immutable.
    Published,
}

/// A change as seen by sinks: its log position, the simulated time of
/// the event that produced it, and the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Position in the change log.
    pub seq: ChangeSeq,
    /// Simulated time of the producing event.
    pub time: SimTime,
    /// The mutation.
    pub change: Change,
}
