//! The discrete-event simulation loop.

use std::sync::Arc;

use indexmap::IndexMap;
use railsim_core::{
    Change, ChangeRecorder, ChangeSink, LoadError, SimTime, SimulationError, StopReachedChange,
    TrainCreatedChange, TrainId, TrainLegChange, TrainStateChange, TrainStatus,
};
use railsim_envelope::{Envelope, POSITION_EPSILON};
use railsim_infra::{Infra, InfraState, RouteRequest, RouteRequestOutcome};
use railsim_physics::{EnvelopePipeline, EnvelopeRequest, PhysicsError, RollingStock};
use tracing::{debug, info, warn};

use crate::changelog::ChangeLog;
use crate::config::SimulationConfig;
use crate::error::SetupError;
use crate::event::{EventKind, EventType, TimelineEvent};
use crate::metrics::SimulationStats;
use crate::queue::EventQueue;
use crate::schedule::{
    index_rolling_stock, resolve_successions, NamedSuccessionTable, TrainPlan, TrainSchedule,
};
use crate::train::{Halt, Leg, Train};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    Over,
    Aborted,
}

/// One simulation run.
///
/// Owns the event queue, the interlocking, the trains, and the change
/// log. Nothing outside the simulation mutates any of them: state only
/// changes while [`step`](Self::step) resolves an event, and every
/// mutation is published to the registered sinks before `step` returns.
///
/// Independent runs share nothing but the immutable [`Infra`], so
/// several simulations may be driven from different threads.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    time: SimTime,
    queue: EventQueue,
    infra: InfraState,
    trains: Vec<Train>,
    log: ChangeLog,
    stats: SimulationStats,
    phase: Phase,
}

impl Simulation {
    /// Validate every input and schedule one departure per train.
    ///
    /// `TrainId(n)` is the train of `schedules[n]`. Departures at the
    /// same time are resolved in schedule order.
    ///
    /// # Errors
    ///
    /// [`SetupError::Config`] if `config` does not validate, and
    /// [`SetupError::Load`] for inconsistent rolling stock, schedules,
    /// or succession tables.
    pub fn new(
        infra: Arc<Infra>,
        rolling_stock: &[RollingStock],
        schedules: &[TrainSchedule],
        successions: &[NamedSuccessionTable],
        config: SimulationConfig,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let stocks = index_rolling_stock(rolling_stock)?;

        let mut names = IndexMap::with_capacity(schedules.len());
        let mut trains = Vec::with_capacity(schedules.len());
        for (i, schedule) in schedules.iter().enumerate() {
            let id = TrainId(i as u32);
            if names.insert(schedule.name.clone(), id).is_some() {
                return Err(LoadError::InvalidSchedule {
                    train: schedule.name.clone(),
                    reason: "duplicate train name".into(),
                }
                .into());
            }
            let plan = TrainPlan::resolve(id, schedule, &infra, &stocks, config.start_time)?;
            trains.push(Train::new(plan));
        }

        let tables = resolve_successions(successions, &infra, &names)?;
        let infra = InfraState::new(infra, tables, config.max_signal_cascade)?;

        let mut queue = EventQueue::new();
        for train in &trains {
            queue.schedule(train.plan.departure_time, train.id(), EventKind::Departure);
        }
        info!(
            trains = trains.len(),
            routes = infra.infra().routes().len(),
            start_time = config.start_time,
            "simulation created"
        );
        Ok(Self {
            time: config.start_time,
            config,
            queue,
            infra,
            trains,
            log: ChangeLog::new(),
            stats: SimulationStats::default(),
            phase: Phase::Running,
        })
    }

    /// Register a sink for every change from now on.
    pub fn add_sink(&mut self, sink: Box<dyn ChangeSink>) {
        self.log.add_sink(sink);
    }

    // ── Queries ────────────────────────────────────────────────

    /// Time of the last resolved event.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// The configuration of this run.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run counters.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// The interlocking.
    pub fn infra_state(&self) -> &InfraState {
        &self.infra
    }

    /// Every train, indexed by [`TrainId`].
    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    /// One train.
    pub fn train(&self, train: TrainId) -> Option<&Train> {
        self.trains.get(train.index())
    }

    /// The train scheduled as `name`.
    pub fn train_by_name(&self, name: &str) -> Option<&Train> {
        self.trains.iter().find(|t| t.name() == name)
    }

    /// Pending events, earliest first.
    pub fn pending_events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.queue.iter()
    }

    /// Whether no event is pending and every train arrived.
    pub fn is_over(&self) -> bool {
        match self.phase {
            Phase::Over => true,
            Phase::Aborted => false,
            Phase::Running => self.queue.is_empty() && self.trains.iter().all(Train::has_arrived),
        }
    }

    /// Whether a run-time error stopped the run.
    pub fn is_aborted(&self) -> bool {
        self.phase == Phase::Aborted
    }

    /// Seconds `train` runs behind its nominal schedule.
    ///
    /// The nominal time at the current head position is the departure
    /// time plus the scheduled envelope time to that position plus the
    /// dwell of every stop already passed. `None` before departure.
    pub fn train_delay(&self, train: TrainId) -> Option<f64> {
        let t = self.trains.get(train.index())?;
        let nominal = t.nominal.as_ref()?;
        let position = t.state_at(self.time).position;
        let elapsed = nominal.time_at(position).ok()?;
        let planned = t.plan.departure_time + elapsed + t.plan.dwell_before(position);
        Some(self.time - planned)
    }

    // ── Driving ────────────────────────────────────────────────

    /// Resolve the earliest pending event and publish its changes.
    ///
    /// Returns the resolved event, or `None` once the run is over;
    /// calling again after that keeps returning `None`.
    ///
    /// # Errors
    ///
    /// The [`SimulationError`] that aborted the run. Changes of the
    /// failed event are discarded; earlier publications stand. Every
    /// later call returns [`SimulationError::Aborted`].
    pub fn step(&mut self) -> Result<Option<TimelineEvent>, SimulationError> {
        match self.phase {
            Phase::Aborted => return Err(SimulationError::Aborted),
            Phase::Over => return Ok(None),
            Phase::Running => {}
        }
        let Some(event) = self.queue.pop() else {
            let waiting: Vec<TrainId> = self
                .trains
                .iter()
                .filter(|t| !t.has_arrived())
                .map(Train::id)
                .collect();
            if waiting.is_empty() {
                self.phase = Phase::Over;
                info!(
                    time = self.time,
                    events = self.stats.events_resolved,
                    changes = self.stats.changes_published,
                    "simulation over"
                );
                return Ok(None);
            }
            self.phase = Phase::Aborted;
            warn!(waiting = waiting.len(), time = self.time, "deadlock");
            return Err(SimulationError::Deadlock { waiting });
        };

        self.time = event.time;
        self.log.set_time(event.time);
        if let Some(t) = self.trains.get_mut(event.train.index()) {
            t.pending.retain(|id| *id != event.id);
        }
        match self.resolve(&event) {
            Ok(()) => {
                let published = self.log.flush();
                self.stats.changes_published += published as u64;
                self.stats.events_resolved += 1;
                debug!(
                    time = event.time,
                    event = event.id.0,
                    train = %event.train,
                    kind = ?event.kind,
                    changes = published,
                    "event resolved"
                );
                Ok(Some(event))
            }
            Err(e) => {
                let dropped = self.log.discard();
                self.phase = Phase::Aborted;
                warn!(time = event.time, event = event.id.0, dropped, error = %e, "simulation aborted");
                Err(e)
            }
        }
    }

    /// Step until the run is over.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn run(&mut self) -> Result<(), SimulationError> {
        while self.step()?.is_some() {}
        Ok(())
    }

    /// Step until an event of one of `types` is resolved, returning it,
    /// or until the run is over.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn run_until(&mut self, types: &[EventType]) -> Result<Option<TimelineEvent>, SimulationError> {
        while let Some(event) = self.step()? {
            if types.contains(&event.event_type()) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    // ── Event handlers ─────────────────────────────────────────

    fn resolve(&mut self, event: &TimelineEvent) -> Result<(), SimulationError> {
        let index = event.train.index();
        if let Some(t) = self.trains.get_mut(index) {
            t.sync(event.time);
        }
        match event.kind {
            EventKind::Departure => self.depart(index),
            EventKind::HeadEnters { section_index } => self.head_enters(index, section_index),
            EventKind::TailLeaves { section_index } => self.tail_leaves(index, section_index),
            EventKind::StopReached { stop_index } => self.stop_reached(index, stop_index),
            EventKind::Restart { .. } => self.replan(index),
            EventKind::AuthorityEnd => self.authority_end(index),
            EventKind::Arrival => self.arrive(index),
        }
    }

    fn depart(&mut self, index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        let train = t.id();
        let envelopes = {
            let pipeline = EnvelopePipeline::new(&t.plan.stock, &t.plan.path, &self.config.physics)
                .map_err(|e| physics(train, e))?;
            pipeline
                .compute(&t.plan.nominal_request())
                .map_err(|e| physics(train, e))?
        };
        self.stats.envelope_computations += 1;
        t.allowance_factor = envelopes.allowance_factor;
        t.nominal = Some(envelopes.scheduled);
        t.departed = true;
        self.log.record(Change::TrainCreated(TrainCreatedChange {
            train,
            name: t.plan.name.clone(),
            path_length: t.plan.length,
            train_length: t.plan.stock.length,
            departure_time: t.plan.departure_time,
            initial_speed: t.plan.initial_speed,
            stop_count: t.plan.stops.len(),
        }));
        record_state(&mut self.log, t);
        info!(train = %train, name = %t.plan.name, "train departed");
        if self.request_next_route(index)? {
            self.request_braking_distance(index)?;
            self.replan(index)?;
        } else if self.trains[index].speed > 0.0 {
            // a running train cannot wait for its first route
            return Err(physics(
                train,
                PhysicsError::InitialSpeedTooHigh {
                    speed: self.trains[index].speed,
                    allowed: 0.0,
                },
            ));
        }
        Ok(())
    }

    fn head_enters(&mut self, index: usize, section_index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        let span = t.plan.sections[section_index];
        t.next_head = section_index + 1;
        let train = t.id();
        let enters_route =
            section_index == 0 || t.plan.sections[section_index - 1].route_index != span.route_index;
        self.infra.occupy_section(span.section, train, &mut self.log)?;
        if enters_route && self.request_next_route(index)? {
            self.replan(index)?;
        }
        Ok(())
    }

    fn tail_leaves(&mut self, index: usize, section_index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        let section = t.plan.sections[section_index].section;
        t.next_tail = section_index + 1;
        let train = t.id();
        let granted = self.infra.free_section(section, train, &mut self.log)?;
        self.handle_grants(granted)
    }

    fn stop_reached(&mut self, index: usize, stop_index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        let stop = t.plan.stops[stop_index];
        t.leg = None;
        t.position = stop.position;
        t.speed = 0.0;
        t.status = TrainStatus::Stopped;
        t.stops_reached = stop_index + 1;
        let train = t.id();
        self.log.record(Change::StopReached(StopReachedChange {
            train,
            stop_index,
            position: stop.position,
        }));
        record_state(&mut self.log, t);
        let restart = self
            .queue
            .schedule(self.time + stop.duration, train, EventKind::Restart { stop_index });
        t.pending.push(restart);
        debug!(train = %train, stop_index, dwell = stop.duration, "stop reached");
        Ok(())
    }

    fn authority_end(&mut self, index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        t.leg = None;
        t.speed = 0.0;
        // granted while the train stood at a stop
        if t.authority_end() > t.position + POSITION_EPSILON {
            return self.replan(index);
        }
        t.status = TrainStatus::WaitingForRoute;
        record_state(&mut self.log, t);
        debug!(train = %t.id(), position = t.position, "waiting for route");
        // The next route is normally requested as the head enters the last granted one.
        if t.requested == t.authority && self.request_next_route(index)? {
            self.replan(index)?;
        }
        Ok(())
    }

    fn arrive(&mut self, index: usize) -> Result<(), SimulationError> {
        let t = &mut self.trains[index];
        let train = t.id();
        t.leg = None;
        t.position = t.plan.length;
        t.speed = 0.0;
        let occupied: Vec<_> = (t.next_tail..t.next_head)
            .map(|i| t.plan.sections[i].section)
            .collect();
        t.next_tail = t.next_head;
        let expected = t.plan.stops.len();
        let reached = t.stops_reached;
        if reached != expected {
            return Err(SimulationError::StopCountMismatch {
                train,
                expected,
                reached,
            });
        }
        t.status = TrainStatus::Arrived;
        record_state(&mut self.log, t);
        info!(train = %train, time = self.time, "train arrived");
        for section in occupied {
            let granted = self.infra.free_section(section, train, &mut self.log)?;
            self.handle_grants(granted)?;
        }
        Ok(())
    }

    // ── Routes ─────────────────────────────────────────────────

    /// Request the first route not requested yet. Returns whether it
    /// was granted on the spot.
    fn request_next_route(&mut self, index: usize) -> Result<bool, SimulationError> {
        let t = &mut self.trains[index];
        let Some(span) = t.plan.routes.get(t.requested).copied() else {
            return Ok(false);
        };
        let train = t.id();
        t.requested += 1;
        match self.infra.request_route(span.route, train, &mut self.log)? {
            RouteRequestOutcome::Granted => {
                t.authority += 1;
                self.stats.route_grants += 1;
                debug!(train = %train, route = %span.route, "route granted");
                Ok(true)
            }
            RouteRequestOutcome::Queued(_) => {
                self.stats.route_denials += 1;
                Ok(false)
            }
        }
    }

    /// Request routes ahead until the train can brake to a stand from
    /// its current speed within its authority, or a request queues.
    fn request_braking_distance(&mut self, index: usize) -> Result<(), SimulationError> {
        loop {
            let t = &self.trains[index];
            let braking = t.speed * t.speed / (2.0 * t.plan.stock.service_deceleration);
            if t.authority_end() - t.position >= braking || !self.request_next_route(index)? {
                return Ok(());
            }
        }
    }

    fn handle_grants(&mut self, granted: Vec<RouteRequest>) -> Result<(), SimulationError> {
        for request in granted {
            let index = request.train.index();
            let t = &mut self.trains[index];
            if t.plan.routes.get(t.authority).map(|s| s.route) != Some(request.route) {
                return Err(SimulationError::InterlockingViolation {
                    route: request.route,
                    reason: format!("granted out of order to {}", request.train),
                });
            }
            t.authority += 1;
            self.stats.route_grants += 1;
            debug!(train = %request.train, route = %request.route, "waiting route granted");
            if t.status != TrainStatus::Stopped {
                t.sync(self.time);
                self.replan(index)?;
            }
        }
        Ok(())
    }

    // ── Leg planning ───────────────────────────────────────────

    /// Cancel the train's pending events and plan a new leg from its
    /// current state to the next halt.
    fn replan(&mut self, index: usize) -> Result<(), SimulationError> {
        let now = self.time;
        let t = &mut self.trains[index];
        let train = t.id();
        for id in t.pending.drain(..) {
            if self.queue.cancel(id).is_some() {
                self.stats.events_cancelled += 1;
            }
        }

        let (x, v) = (t.position, t.speed);
        let (halt_position, halt) = t.next_halt();
        if halt_position - x <= POSITION_EPSILON {
            t.leg = None;
            t.speed = 0.0;
            let id = self.queue.schedule(now, train, halt_event(halt));
            t.pending.push(id);
            return Ok(());
        }

        let envelope = {
            let pipeline = EnvelopePipeline::new(&t.plan.stock, &t.plan.path, &self.config.physics)
                .map_err(|e| physics(train, e))?;
            let request = EnvelopeRequest {
                begin: x,
                end: halt_position,
                initial_speed: v,
                speed_limits: t.plan.speed_limits.clone(),
                stops: Vec::new(),
                allowances: Vec::new(),
            };
            pipeline
                .compute_with_factor(&request, t.allowance_factor)
                .map_err(|e| physics(train, e))?
                .scheduled
        };
        self.stats.envelope_computations += 1;
        let leg = Leg {
            start_time: now,
            envelope,
            halt,
        };

        let mut events = Vec::new();
        for (i, span) in t.plan.sections.iter().enumerate().skip(t.next_head) {
            if span.begin >= halt_position - POSITION_EPSILON {
                break;
            }
            let at = leg_time(&leg, span.begin.max(x), train)?;
            events.push((at, EventKind::HeadEnters { section_index: i }));
        }
        let length = t.plan.stock.length;
        for (i, span) in t.plan.sections.iter().enumerate().skip(t.next_tail) {
            let clear = span.end + length;
            if clear > halt_position + POSITION_EPSILON {
                break;
            }
            let at = leg_time(&leg, clear.max(x), train)?;
            events.push((at, EventKind::TailLeaves { section_index: i }));
        }
        events.push((leg.end_time(), halt_event(halt)));
        for (at, kind) in events {
            let id = self.queue.schedule(at, train, kind);
            t.pending.push(id);
        }

        self.log
            .record(Change::TrainLeg(leg_change(train, &leg.envelope, now)));
        t.status = TrainStatus::Running;
        t.leg = Some(leg);
        record_state(&mut self.log, t);
        debug!(
            train = %train,
            from = x,
            to = halt_position,
            ?halt,
            "leg planned"
        );
        Ok(())
    }
}

const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

fn physics(train: TrainId, error: impl std::fmt::Display) -> SimulationError {
    SimulationError::Physics {
        train,
        reason: error.to_string(),
    }
}

fn halt_event(halt: Halt) -> EventKind {
    match halt {
        Halt::Stop(stop_index) => EventKind::StopReached { stop_index },
        Halt::AuthorityEnd => EventKind::AuthorityEnd,
        Halt::PathEnd => EventKind::Arrival,
    }
}

fn leg_time(leg: &Leg, position: f64, train: TrainId) -> Result<SimTime, SimulationError> {
    leg.time_at(position.min(leg.envelope.end()))
        .map_err(|e| physics(train, e))
}

fn record_state<R: ChangeRecorder + ?Sized>(recorder: &mut R, t: &Train) {
    recorder.record(Change::TrainState(TrainStateChange {
        train: t.id(),
        position: t.position,
        speed: t.speed,
        status: t.status,
    }));
}

/// Flatten `envelope` into absolute `(position, speed, time)` samples.
fn leg_change(train: TrainId, envelope: &Envelope, start_time: SimTime) -> TrainLegChange {
    let mut positions = Vec::new();
    let mut speeds = Vec::new();
    let mut times = Vec::new();
    let mut clock = start_time;
    for part in envelope.parts() {
        let skip_first = positions
            .last()
            .is_some_and(|last: &f64| (part.begin_pos() - last).abs() <= POSITION_EPSILON);
        for (i, (p, v)) in part.positions().iter().zip(part.speeds()).enumerate() {
            if i > 0 {
                clock += part.times()[i - 1];
            }
            if i == 0 && skip_first {
                continue;
            }
            positions.push(*p);
            speeds.push(*v);
            times.push(clock);
        }
    }
    TrainLegChange {
        train,
        positions,
        speeds,
        times,
    }
}
