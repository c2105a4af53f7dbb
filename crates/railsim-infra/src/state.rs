//! The mutable interlocking: route, section, and signal state.

use std::collections::VecDeque;
use std::sync::Arc;

use railsim_core::{
    Aspect, Change, ChangeRecorder, LoadError, RouteId, RouteStatus, RouteStatusChange,
    SignalAspectChange, SignalId, SimulationError, TrainId, TvdOccupancyChange, TvdSectionId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::ReservationDenied;
use crate::graph::Infra;
use crate::succession::{SuccessionCursor, SuccessionTable};

/// Status of one route and the train holding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    /// Position in the route state machine.
    pub status: RouteStatus,
    /// Holder while `Reserved` or `Occupied`.
    pub train: Option<TrainId>,
}

impl Default for RouteState {
    fn default() -> Self {
        Self {
            status: RouteStatus::Free,
            train: None,
        }
    }
}

/// Occupancy and locking of one TVD section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionState {
    /// Train currently detected in the section.
    pub occupant: Option<TrainId>,
    /// Route currently locking the section.
    pub held_by: Option<RouteId>,
}

/// A denied request waiting for its route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteRequest {
    /// The requested route.
    pub route: RouteId,
    /// The requesting train.
    pub train: TrainId,
    /// Arrival order among waiting requests.
    pub seq: u64,
}

/// Result of [`InfraState::request_route`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteRequestOutcome {
    /// The route is now reserved for the train.
    Granted,
    /// The request waits; the reason is the first blocking resource.
    Queued(ReservationDenied),
}

/// The interlocking of one simulation run.
///
/// Owns the status of every route, section, and signal of an [`Infra`]
/// and enforces the route state machine
/// `Free → Reserved → Occupied → Free` (plus `Reserved → Free`
/// cancellation). A route is only reserved when it is free, none of its
/// sections is locked by another route or occupied by another train,
/// and every succession table on its sections lets the train through.
///
/// Signal aspects are derived: a signal shows [`Aspect::Stop`] unless
/// one of its routes is reserved, then [`Aspect::Warning`] when the
/// signal at the route exit shows stop (or there is none), and
/// [`Aspect::Clear`] otherwise. Aspects are recomputed whenever a route
/// or a downstream signal changes; only actual differences are
/// recorded.
///
/// Every mutation is recorded as a [`Change`].
#[derive(Clone, Debug)]
pub struct InfraState {
    infra: Arc<Infra>,
    routes: Vec<RouteState>,
    sections: Vec<SectionState>,
    aspects: Vec<Aspect>,
    successions: Vec<SuccessionCursor>,
    section_succession: Vec<Option<usize>>,
    waiting: Vec<RouteRequest>,
    next_request_seq: u64,
    max_signal_cascade: usize,
}

impl InfraState {
    /// Everything free, vacant, and at stop.
    ///
    /// `max_signal_cascade` bounds how many signal evaluations one
    /// mutation may trigger.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidSuccession`] for an invalid table or two
    /// tables on the same section.
    pub fn new(
        infra: Arc<Infra>,
        tables: Vec<SuccessionTable>,
        max_signal_cascade: usize,
    ) -> Result<Self, LoadError> {
        let mut section_succession = vec![None; infra.sections().len()];
        let mut successions = Vec::with_capacity(tables.len());
        for table in tables {
            table.validate(&infra)?;
            let slot = &mut section_succession[table.section.index()];
            if slot.is_some() {
                return Err(LoadError::InvalidSuccession {
                    section: infra.sections()[table.section.index()].name.clone(),
                    reason: "more than one table".into(),
                });
            }
            *slot = Some(successions.len());
            successions.push(SuccessionCursor::new(table));
        }
        Ok(Self {
            routes: vec![RouteState::default(); infra.routes().len()],
            sections: vec![SectionState::default(); infra.sections().len()],
            aspects: vec![Aspect::Stop; infra.signals().len()],
            successions,
            section_succession,
            waiting: Vec::new(),
            next_request_seq: 0,
            max_signal_cascade,
            infra,
        })
    }

    // ── Queries ────────────────────────────────────────────────

    /// The static graph.
    pub fn infra(&self) -> &Arc<Infra> {
        &self.infra
    }

    /// State of `route`.
    pub fn route_state(&self, route: RouteId) -> Option<RouteState> {
        self.routes.get(route.index()).copied()
    }

    /// State of `section`.
    pub fn section_state(&self, section: TvdSectionId) -> Option<SectionState> {
        self.sections.get(section.index()).copied()
    }

    /// Aspect displayed by `signal`.
    pub fn aspect(&self, signal: SignalId) -> Option<Aspect> {
        self.aspects.get(signal.index()).copied()
    }

    /// Waiting requests, oldest first.
    pub fn waiting(&self) -> &[RouteRequest] {
        &self.waiting
    }

    /// Whether `train` has a request waiting.
    pub fn is_waiting(&self, train: TrainId) -> bool {
        self.waiting.iter().any(|r| r.train == train)
    }

    /// Routes currently reserved or occupied by `train`.
    pub fn routes_held_by(&self, train: TrainId) -> Vec<RouteId> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.train == Some(train))
            .map(|(i, _)| RouteId(i as u32))
            .collect()
    }

    /// Why `route` cannot be reserved for `train` right now, if at all.
    ///
    /// # Errors
    ///
    /// The first blocking resource.
    pub fn check_reservation(&self, route: RouteId, train: TrainId) -> Result<(), ReservationDenied> {
        let (Some(r), Some(state)) = (self.infra.route(route), self.routes.get(route.index()))
        else {
            return Err(ReservationDenied::UnknownRoute { route });
        };
        if state.status != RouteStatus::Free {
            return Err(ReservationDenied::RouteBusy {
                route,
                status: state.status,
            });
        }
        for p in &r.path {
            let section = self.sections[p.section.index()];
            if let Some(holder) = section.held_by {
                return Err(ReservationDenied::SectionHeld {
                    section: p.section,
                    holder,
                });
            }
            if let Some(occupant) = section.occupant.filter(|t| *t != train) {
                return Err(ReservationDenied::SectionOccupied {
                    section: p.section,
                    train: occupant,
                });
            }
            if let Some(cursor) = self.cursor(p.section) {
                if !cursor.permits(train) {
                    return Err(ReservationDenied::SuccessionOrder {
                        section: p.section,
                        expected: cursor.expected().unwrap_or(train),
                    });
                }
            }
        }
        Ok(())
    }

    fn cursor(&self, section: TvdSectionId) -> Option<&SuccessionCursor> {
        self.section_succession
            .get(section.index())
            .copied()
            .flatten()
            .map(|i| &self.successions[i])
    }

    // ── Reservation ────────────────────────────────────────────

    /// Reserve `route` for `train`, which must pass
    /// [`check_reservation`](Self::check_reservation).
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] if the route is blocked,
    /// or if refreshing the entry signal overflows the cascade limit.
    pub fn reserve<R: ChangeRecorder + ?Sized>(
        &mut self,
        route: RouteId,
        train: TrainId,
        recorder: &mut R,
    ) -> Result<(), SimulationError> {
        if let Err(denied) = self.check_reservation(route, train) {
            return Err(violation(route, format!("{train} reserved a blocked route: {denied}")));
        }
        let r = &self.infra.routes()[route.index()];
        for p in &r.path {
            self.sections[p.section.index()].held_by = Some(route);
            if let Some(i) = self.section_succession[p.section.index()] {
                self.successions[i].advance(train);
            }
        }
        self.set_route(route, RouteStatus::Reserved, Some(train), recorder);
        debug!(route = %route, train = %train, "route reserved");
        self.refresh_route_signal(route, recorder)
    }

    /// Reserve `route` for `train`, or queue the request until the
    /// blocking resource is released.
    ///
    /// A train never has the same route queued twice.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] for an unknown route,
    /// or when a granted reservation fails as [`reserve`](Self::reserve)
    /// does.
    pub fn request_route<R: ChangeRecorder + ?Sized>(
        &mut self,
        route: RouteId,
        train: TrainId,
        recorder: &mut R,
    ) -> Result<RouteRequestOutcome, SimulationError> {
        match self.check_reservation(route, train) {
            Ok(()) => {
                self.reserve(route, train, recorder)?;
                Ok(RouteRequestOutcome::Granted)
            }
            Err(ReservationDenied::UnknownRoute { route }) => {
                Err(SimulationError::InterlockingViolation {
                    route,
                    reason: "unknown route".into(),
                })
            }
            Err(denied) => {
                warn!(route = %route, train = %train, reason = %denied, "route request queued");
                if !self
                    .waiting
                    .iter()
                    .any(|w| w.route == route && w.train == train)
                {
                    self.waiting.push(RouteRequest {
                        route,
                        train,
                        seq: self.next_request_seq,
                    });
                    self.next_request_seq += 1;
                }
                Ok(RouteRequestOutcome::Queued(denied))
            }
        }
    }

    /// Grant every waiting request that has become possible.
    ///
    /// Among grantable requests, the train ranked first by a succession
    /// table on the route's sections wins; unranked trains and ties go
    /// in request order. Each grant may block others, so candidates are
    /// re-evaluated after every grant. Returns the granted requests.
    ///
    /// # Errors
    ///
    /// As [`reserve`](Self::reserve).
    pub fn process_waiting<R: ChangeRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
    ) -> Result<Vec<RouteRequest>, SimulationError> {
        let mut granted = Vec::new();
        loop {
            let best = self
                .waiting
                .iter()
                .enumerate()
                .filter(|(_, w)| self.check_reservation(w.route, w.train).is_ok())
                .min_by_key(|(_, w)| (self.succession_rank(w), w.seq))
                .map(|(i, _)| i);
            let Some(index) = best else {
                break;
            };
            let request = self.waiting.remove(index);
            self.reserve(request.route, request.train, recorder)?;
            granted.push(request);
        }
        Ok(granted)
    }

    fn succession_rank(&self, request: &RouteRequest) -> usize {
        let Some(route) = self.infra.route(request.route) else {
            return usize::MAX;
        };
        route
            .path
            .iter()
            .filter_map(|p| self.cursor(p.section))
            .filter_map(|c| c.rank_of(request.train))
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Withdraw every waiting request of `train`.
    pub fn withdraw_requests(&mut self, train: TrainId) {
        self.waiting.retain(|w| w.train != train);
    }

    /// Cancel a reservation before the train enters the route.
    ///
    /// Returns the waiting requests granted as a consequence.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] unless `route` is
    /// reserved by `train`.
    pub fn cancel_route<R: ChangeRecorder + ?Sized>(
        &mut self,
        route: RouteId,
        train: TrainId,
        recorder: &mut R,
    ) -> Result<Vec<RouteRequest>, SimulationError> {
        let state = self.route_state(route).ok_or_else(|| violation(route, "unknown route"))?;
        if state.status != RouteStatus::Reserved || state.train != Some(train) {
            return Err(violation(
                route,
                format!("{train} cannot cancel a {:?} route", state.status),
            ));
        }
        self.release_holds(route);
        self.set_route(route, RouteStatus::Free, None, recorder);
        debug!(route = %route, train = %train, "route cancelled");
        self.refresh_route_signal(route, recorder)?;
        self.process_waiting(recorder)
    }

    // ── Occupancy ──────────────────────────────────────────────

    /// `train`'s head entered `section`.
    ///
    /// Occupying the first section of a route reserved by the train
    /// moves the route to `Occupied`.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] if the section is not
    /// locked by a route held by `train`, or is already occupied.
    pub fn occupy_section<R: ChangeRecorder + ?Sized>(
        &mut self,
        section: TvdSectionId,
        train: TrainId,
        recorder: &mut R,
    ) -> Result<(), SimulationError> {
        let state = self.section_state(section).ok_or_else(|| {
            violation(RouteId(u32::MAX), format!("unknown {section}"))
        })?;
        let route = state
            .held_by
            .filter(|r| self.routes[r.index()].train == Some(train))
            .ok_or_else(|| {
                let route = self.infra.sections()[section.index()]
                    .routes
                    .first()
                    .copied()
                    .unwrap_or(RouteId(u32::MAX));
                violation(route, format!("{train} entered unlocked {section}"))
            })?;
        if let Some(other) = state.occupant {
            return Err(violation(route, format!("{section} already occupied by {other}")));
        }

        self.sections[section.index()].occupant = Some(train);
        recorder.record(Change::TvdOccupancy(TvdOccupancyChange {
            section,
            train,
            occupied: true,
        }));
        trace!(section = %section, train = %train, "section occupied");

        let r = &self.infra.routes()[route.index()];
        if self.routes[route.index()].status == RouteStatus::Reserved && r.first_section() == section {
            self.set_route(route, RouteStatus::Occupied, Some(train), recorder);
            self.refresh_route_signal(route, recorder)?;
        }
        Ok(())
    }

    /// `train`'s tail cleared `section`.
    ///
    /// The section is unlocked at once. Clearing the last section of an
    /// occupied route frees the route. Waiting requests are then
    /// re-examined; the ones granted are returned.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] if `train` does not
    /// occupy the section.
    pub fn free_section<R: ChangeRecorder + ?Sized>(
        &mut self,
        section: TvdSectionId,
        train: TrainId,
        recorder: &mut R,
    ) -> Result<Vec<RouteRequest>, SimulationError> {
        let state = self.section_state(section).ok_or_else(|| {
            violation(RouteId(u32::MAX), format!("unknown {section}"))
        })?;
        if state.occupant != Some(train) {
            let route = state.held_by.unwrap_or(RouteId(u32::MAX));
            return Err(violation(route, format!("{train} does not occupy {section}")));
        }

        self.sections[section.index()] = SectionState::default();
        recorder.record(Change::TvdOccupancy(TvdOccupancyChange {
            section,
            train,
            occupied: false,
        }));
        trace!(section = %section, train = %train, "section cleared");

        if let Some(route) = state.held_by {
            let r = &self.infra.routes()[route.index()];
            let rs = self.routes[route.index()];
            if rs.status == RouteStatus::Occupied && rs.train == Some(train) && r.last_section() == section {
                self.release_holds(route);
                self.set_route(route, RouteStatus::Free, None, recorder);
                debug!(route = %route, train = %train, "route released");
                self.refresh_route_signal(route, recorder)?;
            }
        }
        self.process_waiting(recorder)
    }

    // ── Replay ─────────────────────────────────────────────────

    /// Re-apply a published change without side effects.
    ///
    /// Route, occupancy, and aspect changes overwrite the matching state;
    /// section locks follow route reservations and releases. Train
    /// changes are ignored. No signal cascade runs and nothing is
    /// recorded, since the cascade's own changes follow in the log.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InterlockingViolation`] for an unknown entity
    /// or an illegal route transition.
    pub fn apply(&mut self, change: &Change) -> Result<(), SimulationError> {
        match change {
            Change::RouteStatus(c) => {
                let current = self
                    .route_state(c.route)
                    .ok_or_else(|| violation(c.route, "unknown route"))?;
                if current.status != c.from || !c.from.can_transition_to(c.to) {
                    return Err(violation(
                        c.route,
                        format!("cannot replay {:?} -> {:?} from {:?}", c.from, c.to, current.status),
                    ));
                }
                match c.to {
                    RouteStatus::Reserved => {
                        for p in &self.infra.routes()[c.route.index()].path {
                            self.sections[p.section.index()].held_by = Some(c.route);
                        }
                    }
                    RouteStatus::Free => self.release_holds(c.route),
                    RouteStatus::Occupied => {}
                }
                self.routes[c.route.index()] = RouteState {
                    status: c.to,
                    train: c.train,
                };
            }
            Change::TvdOccupancy(c) => {
                let section = self
                    .sections
                    .get_mut(c.section.index())
                    .ok_or_else(|| violation(RouteId(u32::MAX), format!("unknown {}", c.section)))?;
                if c.occupied {
                    section.occupant = Some(c.train);
                } else {
                    *section = SectionState::default();
                }
            }
            Change::SignalAspect(c) => {
                let aspect = self
                    .aspects
                    .get_mut(c.signal.index())
                    .ok_or_else(|| violation(RouteId(u32::MAX), format!("unknown {}", c.signal)))?;
                *aspect = c.to;
            }
            Change::TrainCreated(_)
            | Change::TrainState(_)
            | Change::TrainLeg(_)
            | Change::StopReached(_) => {}
        }
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────

    fn set_route<R: ChangeRecorder + ?Sized>(
        &mut self,
        route: RouteId,
        to: RouteStatus,
        train: Option<TrainId>,
        recorder: &mut R,
    ) {
        let state = &mut self.routes[route.index()];
        let from = state.status;
        debug_assert!(from.can_transition_to(to), "{route}: {from:?} -> {to:?}");
        *state = RouteState { status: to, train };
        recorder.record(Change::RouteStatus(RouteStatusChange {
            route,
            from,
            to,
            train,
        }));
    }

    fn release_holds(&mut self, route: RouteId) {
        for p in &self.infra.routes()[route.index()].path {
            let section = &mut self.sections[p.section.index()];
            if section.held_by == Some(route) {
                section.held_by = None;
            }
        }
    }

    fn refresh_route_signal<R: ChangeRecorder + ?Sized>(
        &mut self,
        route: RouteId,
        recorder: &mut R,
    ) -> Result<(), SimulationError> {
        match self.infra.routes()[route.index()].entry_signal {
            Some(signal) => self.refresh_signals(signal, route, recorder),
            None => Ok(()),
        }
    }

    /// Recompute `start` and, breadth-first, every upstream signal whose
    /// aspect may depend on a changed one.
    fn refresh_signals<R: ChangeRecorder + ?Sized>(
        &mut self,
        start: SignalId,
        origin: RouteId,
        recorder: &mut R,
    ) -> Result<(), SimulationError> {
        let infra = Arc::clone(&self.infra);
        let mut queue = VecDeque::from([start]);
        let mut evaluations = 0usize;
        while let Some(signal) = queue.pop_front() {
            evaluations += 1;
            if evaluations > self.max_signal_cascade {
                return Err(violation(
                    origin,
                    format!("signal cascade exceeded {} evaluations", self.max_signal_cascade),
                ));
            }
            let from = self.aspects[signal.index()];
            let to = self.compute_aspect(signal);
            if from == to {
                continue;
            }
            self.aspects[signal.index()] = to;
            recorder.record(Change::SignalAspect(SignalAspectChange { signal, from, to }));
            trace!(signal = %signal, ?from, ?to, "aspect changed");
            queue.extend(infra.signals()[signal.index()].previous_signals.iter().copied());
        }
        Ok(())
    }

    fn compute_aspect(&self, signal: SignalId) -> Aspect {
        let s = &self.infra.signals()[signal.index()];
        let computed = s
            .routes
            .iter()
            .filter(|r| self.routes[r.index()].status == RouteStatus::Reserved)
            .map(|r| match self.infra.routes()[r.index()].exit_signal {
                Some(exit) if self.aspects[exit.index()] != Aspect::Stop => Aspect::Clear,
                _ => Aspect::Warning,
            })
            .max()
            .unwrap_or(Aspect::Stop);
        s.aspects.resolve(computed)
    }
}

fn violation(route: RouteId, reason: impl Into<String>) -> SimulationError {
    SimulationError::InterlockingViolation {
        route,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::AspectSet;
    use crate::builder::InfraBuilder;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    /// `A -R0-> B -R1-> C -R2-> end`, one section per route.
    fn line() -> InfraState {
        line_with_cascade(64)
    }

    fn line_with_cascade(max_signal_cascade: usize) -> InfraState {
        let mut b = InfraBuilder::new();
        let sections: Vec<_> = (0..3).map(|i| b.add_section(format!("S{i}")).unwrap()).collect();
        let signals: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| b.add_signal(*n, AspectSet::ALL).unwrap())
            .collect();
        for i in 0..3 {
            b.add_route(
                format!("R{i}"),
                &[(sections[i], 1000.0)],
                Some(signals[i]),
                signals.get(i + 1).copied(),
            )
            .unwrap();
        }
        InfraState::new(Arc::new(b.build().unwrap()), Vec::new(), max_signal_cascade).unwrap()
    }

    fn route_changes(log: &[Change]) -> Vec<(RouteId, RouteStatus)> {
        log.iter()
            .filter_map(|c| match c {
                Change::RouteStatus(r) => Some((r.route, r.to)),
                _ => None,
            })
            .collect()
    }

    // ── Route state machine ────────────────────────────────────

    #[test]
    fn full_cycle_records_every_transition() {
        let mut state = line();
        let mut log = Vec::new();
        let (r0, s0, t) = (RouteId(0), TvdSectionId(0), TrainId(0));
        assert_eq!(state.request_route(r0, t, &mut log), Ok(RouteRequestOutcome::Granted));
        state.occupy_section(s0, t, &mut log).unwrap();
        state.free_section(s0, t, &mut log).unwrap();
        assert_eq!(
            route_changes(&log),
            vec![
                (r0, RouteStatus::Reserved),
                (r0, RouteStatus::Occupied),
                (r0, RouteStatus::Free)
            ]
        );
        assert_eq!(state.route_state(r0), Some(RouteState::default()));
        assert_eq!(state.section_state(s0), Some(SectionState::default()));
    }

    #[traced_test]
    #[test]
    fn busy_route_is_denied_without_mutation() {
        let mut state = line();
        let mut log = Vec::new();
        state.request_route(RouteId(0), TrainId(0), &mut log).unwrap();
        let before = (state.route_state(RouteId(0)), log.len());
        let outcome = state.request_route(RouteId(0), TrainId(1), &mut log).unwrap();
        assert!(matches!(
            outcome,
            RouteRequestOutcome::Queued(ReservationDenied::RouteBusy { .. })
        ));
        assert_eq!((state.route_state(RouteId(0)), log.len()), before);
        assert!(state.is_waiting(TrainId(1)));
        assert!(logs_contain("route request queued"));
    }

    #[test]
    fn waiting_train_is_granted_on_release() {
        let mut state = line();
        let mut log = Vec::new();
        let (r0, s0) = (RouteId(0), TvdSectionId(0));
        state.request_route(r0, TrainId(0), &mut log).unwrap();
        state.request_route(r0, TrainId(1), &mut log).unwrap();
        state.request_route(r0, TrainId(2), &mut log).unwrap();
        state.occupy_section(s0, TrainId(0), &mut log).unwrap();
        let granted = state.free_section(s0, TrainId(0), &mut log).unwrap();
        assert_eq!(granted.len(), 1);
        // FIFO: train 1 asked first
        assert_eq!(state.route_state(r0).unwrap().train, Some(TrainId(1)));
        assert_eq!(state.waiting().len(), 1);
        assert_eq!(state.waiting()[0].train, TrainId(2));
    }

    #[test]
    fn cancellation_frees_reserved_route() {
        let mut state = line();
        let mut log = Vec::new();
        state.request_route(RouteId(1), TrainId(0), &mut log).unwrap();
        state.cancel_route(RouteId(1), TrainId(0), &mut log).unwrap();
        assert_eq!(state.route_state(RouteId(1)).unwrap().status, RouteStatus::Free);
        assert_eq!(state.section_state(TvdSectionId(1)).unwrap().held_by, None);
    }

    #[test]
    fn occupied_route_cannot_be_cancelled() {
        let mut state = line();
        let mut log = Vec::new();
        state.request_route(RouteId(0), TrainId(0), &mut log).unwrap();
        state.occupy_section(TvdSectionId(0), TrainId(0), &mut log).unwrap();
        match state.cancel_route(RouteId(0), TrainId(0), &mut log) {
            Err(SimulationError::InterlockingViolation { route, .. }) => assert_eq!(route, RouteId(0)),
            other => panic!("expected InterlockingViolation, got {other:?}"),
        }
    }

    #[test]
    fn entering_unlocked_section_is_a_violation() {
        let mut state = line();
        let mut log = Vec::new();
        assert!(matches!(
            state.occupy_section(TvdSectionId(2), TrainId(0), &mut log),
            Err(SimulationError::InterlockingViolation { .. })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn unknown_route_is_a_violation() {
        let mut state = line();
        let mut log = Vec::new();
        assert!(state.request_route(RouteId(42), TrainId(0), &mut log).is_err());
    }

    #[test]
    fn conflicting_route_waits_for_section() {
        let mut b = InfraBuilder::new();
        let a = b.add_section("A").unwrap();
        let shared = b.add_section("X").unwrap();
        let c = b.add_section("C").unwrap();
        let r0 = b.add_route("R0", &[(a, 100.0), (shared, 100.0)], None, None).unwrap();
        let r1 = b.add_route("R1", &[(c, 100.0), (shared, 100.0)], None, None).unwrap();
        let mut state = InfraState::new(Arc::new(b.build().unwrap()), Vec::new(), 64).unwrap();
        let mut log = Vec::new();
        state.request_route(r0, TrainId(0), &mut log).unwrap();
        let outcome = state.request_route(r1, TrainId(1), &mut log).unwrap();
        assert_eq!(
            outcome,
            RouteRequestOutcome::Queued(ReservationDenied::SectionHeld {
                section: shared,
                holder: r0
            })
        );
        state.cancel_route(r0, TrainId(0), &mut log).unwrap();
        assert_eq!(state.route_state(r1).unwrap().train, Some(TrainId(1)));
    }

    // ── Succession ─────────────────────────────────────────────

    #[test]
    fn succession_table_overrides_request_order() {
        let mut b = InfraBuilder::new();
        let s = b.add_section("S").unwrap();
        let r = b.add_route("R", &[(s, 100.0)], None, None).unwrap();
        let table = SuccessionTable::new(s, vec![TrainId(1), TrainId(0)]);
        let mut state = InfraState::new(Arc::new(b.build().unwrap()), vec![table], 64).unwrap();
        let mut log = Vec::new();

        let outcome = state.request_route(r, TrainId(0), &mut log).unwrap();
        assert_eq!(
            outcome,
            RouteRequestOutcome::Queued(ReservationDenied::SuccessionOrder {
                section: s,
                expected: TrainId(1)
            })
        );
        assert_eq!(state.request_route(r, TrainId(1), &mut log).unwrap(), RouteRequestOutcome::Granted);
        state.occupy_section(s, TrainId(1), &mut log).unwrap();
        state.free_section(s, TrainId(1), &mut log).unwrap();
        assert_eq!(state.route_state(r).unwrap().train, Some(TrainId(0)));
    }

    #[test]
    fn two_tables_on_one_section_rejected() {
        let mut b = InfraBuilder::new();
        let s = b.add_section("S").unwrap();
        b.add_route("R", &[(s, 100.0)], None, None).unwrap();
        let tables = vec![
            SuccessionTable::new(s, vec![TrainId(0)]),
            SuccessionTable::new(s, vec![TrainId(1)]),
        ];
        assert!(matches!(
            InfraState::new(Arc::new(b.build().unwrap()), tables, 64),
            Err(LoadError::InvalidSuccession { .. })
        ));
    }

    // ── Signals ────────────────────────────────────────────────

    #[test]
    fn aspects_follow_reservations() {
        let mut state = line();
        let mut log = Vec::new();
        let (a, b, c) = (SignalId(0), SignalId(1), SignalId(2));
        state.request_route(RouteId(0), TrainId(0), &mut log).unwrap();
        // next signal B still at stop
        assert_eq!(state.aspect(a), Some(Aspect::Warning));
        state.request_route(RouteId(1), TrainId(0), &mut log).unwrap();
        assert_eq!(state.aspect(b), Some(Aspect::Warning));
        assert_eq!(state.aspect(a), Some(Aspect::Clear));
        state.request_route(RouteId(2), TrainId(0), &mut log).unwrap();
        // R2 ends at a buffer stop
        assert_eq!(state.aspect(c), Some(Aspect::Warning));
        assert_eq!(state.aspect(b), Some(Aspect::Clear));
        // entering R0 puts A back to stop, which does not affect B or C
        state.occupy_section(TvdSectionId(0), TrainId(0), &mut log).unwrap();
        assert_eq!(state.aspect(a), Some(Aspect::Stop));
        assert_eq!(state.aspect(b), Some(Aspect::Clear));
    }

    #[test]
    fn unchanged_aspects_are_not_recorded() {
        let mut state = line();
        let mut log = Vec::new();
        state.request_route(RouteId(2), TrainId(0), &mut log).unwrap();
        let aspect_changes = |log: &[Change]| {
            log.iter()
                .filter(|c| matches!(c, Change::SignalAspect(_)))
                .count()
        };
        // C: Stop -> Warning; B stays Stop, so the cascade stops there
        assert_eq!(aspect_changes(&log), 1);
    }

    #[test]
    fn two_aspect_signal_resolves_warning_to_stop() {
        let mut b = InfraBuilder::new();
        let s = b.add_section("S").unwrap();
        let sig = b.add_signal("A", AspectSet::TWO_ASPECT).unwrap();
        let r = b.add_route("R", &[(s, 100.0)], Some(sig), None).unwrap();
        let mut state = InfraState::new(Arc::new(b.build().unwrap()), Vec::new(), 64).unwrap();
        let mut log = Vec::new();
        state.request_route(r, TrainId(0), &mut log).unwrap();
        assert_eq!(state.aspect(sig), Some(Aspect::Stop));
        assert!(!log.iter().any(|c| matches!(c, Change::SignalAspect(_))));
    }

    #[test]
    fn reservation_fails_when_the_cascade_overflows() {
        let mut state = line_with_cascade(1);
        let mut log = Vec::new();
        // only A changes
        state.request_route(RouteId(0), TrainId(0), &mut log).unwrap();
        // B changes, then A is re-evaluated
        match state.request_route(RouteId(1), TrainId(0), &mut log) {
            Err(SimulationError::InterlockingViolation { route, reason }) => {
                assert_eq!(route, RouteId(1));
                assert!(reason.contains("signal cascade"), "{reason}");
            }
            other => panic!("expected InterlockingViolation, got {other:?}"),
        }
    }

    #[test]
    fn granting_a_waiting_request_fails_when_the_cascade_overflows() {
        let mut state = line_with_cascade(2);
        let mut log = Vec::new();
        let (b, c) = (SignalId(1), SignalId(2));
        // C changes, B is re-evaluated and stays at stop
        state.request_route(RouteId(2), TrainId(2), &mut log).unwrap();
        state.occupy_section(TvdSectionId(2), TrainId(2), &mut log).unwrap();
        assert!(matches!(
            state.request_route(RouteId(2), TrainId(1), &mut log),
            Ok(RouteRequestOutcome::Queued(_))
        ));
        state.request_route(RouteId(1), TrainId(0), &mut log).unwrap();
        assert_eq!(state.aspect(b), Some(Aspect::Warning));
        assert_eq!(state.aspect(c), Some(Aspect::Stop));
        // the grant changes C then B, and A makes a third evaluation
        match state.free_section(TvdSectionId(2), TrainId(2), &mut log) {
            Err(SimulationError::InterlockingViolation { route, reason }) => {
                assert_eq!(route, RouteId(2));
                assert!(reason.contains("signal cascade"), "{reason}");
            }
            other => panic!("expected InterlockingViolation, got {other:?}"),
        }
    }

    // ── Replay ─────────────────────────────────────────────────

    #[test]
    fn applying_recorded_changes_reproduces_state() {
        let mut live = line();
        let mut log = Vec::new();
        live.request_route(RouteId(0), TrainId(0), &mut log).unwrap();
        live.request_route(RouteId(1), TrainId(0), &mut log).unwrap();
        live.occupy_section(TvdSectionId(0), TrainId(0), &mut log).unwrap();
        live.occupy_section(TvdSectionId(1), TrainId(0), &mut log).unwrap();
        live.free_section(TvdSectionId(0), TrainId(0), &mut log).unwrap();

        let mut replica = line();
        for change in &log {
            replica.apply(change).unwrap();
        }
        for i in 0..3 {
            assert_eq!(replica.route_state(RouteId(i)), live.route_state(RouteId(i)));
            assert_eq!(replica.section_state(TvdSectionId(i)), live.section_state(TvdSectionId(i)));
            assert_eq!(replica.aspect(SignalId(i)), live.aspect(SignalId(i)));
        }
    }

    #[test]
    fn replaying_illegal_transition_fails() {
        let mut state = line();
        let change = Change::RouteStatus(RouteStatusChange {
            route: RouteId(0),
            from: RouteStatus::Free,
            to: RouteStatus::Occupied,
            train: Some(TrainId(0)),
        });
        assert!(state.apply(&change).is_err());
    }

    // ── Exclusivity ────────────────────────────────────────────

    #[derive(Clone, Debug)]
    enum Op {
        Request(u32),
        Enter(u32),
        Leave(u32),
        Cancel(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..4).prop_map(Op::Request),
            (0u32..4).prop_map(Op::Enter),
            (0u32..4).prop_map(Op::Leave),
            (0u32..4).prop_map(Op::Cancel),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_train_holds_a_route(ops in proptest::collection::vec(op(), 1..60)) {
            let mut b = InfraBuilder::new();
            let s = b.add_section("S").unwrap();
            let r = b.add_route("R", &[(s, 100.0)], None, None).unwrap();
            let mut state = InfraState::new(Arc::new(b.build().unwrap()), Vec::new(), 64).unwrap();
            let mut log = Vec::new();
            for op in ops {
                // Illegal moves are rejected; the invariant must hold regardless.
                let _ = match op {
                    Op::Request(t) => state.request_route(r, TrainId(t), &mut log).map(|_| ()),
                    Op::Enter(t) => state.occupy_section(s, TrainId(t), &mut log),
                    Op::Leave(t) => state.free_section(s, TrainId(t), &mut log).map(|_| ()),
                    Op::Cancel(t) => state.cancel_route(r, TrainId(t), &mut log).map(|_| ()),
                };
                let route = state.route_state(r).unwrap();
                prop_assert_eq!(route.status == RouteStatus::Free, route.train.is_none());
                if let Some(occupant) = state.section_state(s).unwrap().occupant {
                    prop_assert_eq!(route.train, Some(occupant));
                }
            }
            let mut status = RouteStatus::Free;
            for change in &log {
                if let Change::RouteStatus(c) = change {
                    prop_assert_eq!(c.from, status);
                    prop_assert!(c.from.can_transition_to(c.to));
                    status = c.to;
                }
            }
        }
    }
}
