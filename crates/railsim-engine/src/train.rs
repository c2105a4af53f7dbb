//! Per-train movement state.
//!
//! A [`Train`] moves leg by leg. A [`Leg`] is one envelope from the
//! train's position when it was planned to the next [`Halt`]; between
//! events the train's position and speed are read off the current leg.

use railsim_core::{EventId, SimTime, TrainId, TrainStatus};
use railsim_envelope::{Envelope, EnvelopeError, EnvelopeState, POSITION_EPSILON};

use crate::schedule::TrainPlan;

/// Why a leg ends where it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// At the scheduled stop with this index.
    Stop(usize),
    /// At the end of the last granted route.
    AuthorityEnd,
    /// At the end of the path.
    PathEnd,
}

/// One planned movement of a train.
#[derive(Clone, Debug)]
pub struct Leg {
    /// When the train is at the envelope's begin.
    pub start_time: SimTime,
    /// Speed profile from the start position to the halt.
    pub envelope: Envelope,
    /// Where the leg ends.
    pub halt: Halt,
}

impl Leg {
    /// Position and speed at `time`, clamped to the leg.
    pub fn state_at(&self, time: SimTime) -> EnvelopeState {
        let elapsed = (time - self.start_time).clamp(0.0, self.envelope.total_time());
        self.envelope
            .state_at_time(elapsed)
            .unwrap_or(EnvelopeState {
                position: self.envelope.end(),
                speed: self.envelope.end_speed(),
            })
    }

    /// Absolute time at which the head reaches `position`.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::OutOfRange`] outside the leg.
    pub fn time_at(&self, position: f64) -> Result<SimTime, EnvelopeError> {
        Ok(self.start_time + self.envelope.time_at(position)?)
    }

    /// Absolute time at which the leg ends.
    pub fn end_time(&self) -> SimTime {
        self.start_time + self.envelope.total_time()
    }
}

/// A train of one simulation run.
#[derive(Clone, Debug)]
pub struct Train {
    pub(crate) plan: TrainPlan,
    pub(crate) status: TrainStatus,
    pub(crate) position: f64,
    pub(crate) speed: f64,
    pub(crate) leg: Option<Leg>,
    /// Number of routes granted, a prefix of the planned routes.
    pub(crate) authority: usize,
    /// Number of routes requested, granted or waiting.
    pub(crate) requested: usize,
    /// Index of the next section the head enters.
    pub(crate) next_head: usize,
    /// Index of the next section the tail clears.
    pub(crate) next_tail: usize,
    pub(crate) stops_reached: usize,
    pub(crate) pending: Vec<EventId>,
    pub(crate) allowance_factor: f64,
    pub(crate) nominal: Option<Envelope>,
    pub(crate) departed: bool,
}

impl Train {
    pub(crate) fn new(plan: TrainPlan) -> Self {
        Self {
            speed: plan.initial_speed,
            plan,
            status: TrainStatus::Starting,
            position: 0.0,
            leg: None,
            authority: 0,
            requested: 0,
            next_head: 0,
            next_tail: 0,
            stops_reached: 0,
            pending: Vec::new(),
            allowance_factor: 1.0,
            nominal: None,
            departed: false,
        }
    }

    /// Handle of the train.
    pub fn id(&self) -> TrainId {
        self.plan.id
    }

    /// Schedule name.
    pub fn name(&self) -> &str {
        &self.plan.name
    }

    /// The resolved schedule.
    pub fn plan(&self) -> &TrainPlan {
        &self.plan
    }

    /// Current status.
    pub fn status(&self) -> TrainStatus {
        self.status
    }

    /// Whether the train entered the simulation.
    pub fn has_departed(&self) -> bool {
        self.departed
    }

    /// Whether the train reached the end of its path.
    pub fn has_arrived(&self) -> bool {
        self.status == TrainStatus::Arrived
    }

    /// Head position at the last resolved event.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Speed at the last resolved event.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The leg being run, if moving.
    pub fn leg(&self) -> Option<&Leg> {
        self.leg.as_ref()
    }

    /// Scheduled stops reached so far.
    pub fn stops_reached(&self) -> usize {
        self.stops_reached
    }

    /// Routes granted so far, in running order.
    pub fn granted_routes(&self) -> usize {
        self.authority
    }

    /// The full-path envelope the delay is measured against.
    pub fn nominal(&self) -> Option<&Envelope> {
        self.nominal.as_ref()
    }

    /// Speed scale factor derived from the allowances.
    pub fn allowance_factor(&self) -> f64 {
        self.allowance_factor
    }

    /// Head position and speed at `time`.
    pub fn state_at(&self, time: SimTime) -> EnvelopeState {
        match &self.leg {
            Some(leg) => leg.state_at(time),
            None => EnvelopeState {
                position: self.position,
                speed: self.speed,
            },
        }
    }

    /// Path position up to which the train may run.
    pub fn authority_end(&self) -> f64 {
        match self.authority {
            0 => 0.0,
            n => self.plan.routes[n - 1].end,
        }
    }

    /// Where the next leg must end, and why.
    ///
    /// A stop wins over the authority end it coincides with.
    pub fn next_halt(&self) -> (f64, Halt) {
        let authority_end = self.authority_end();
        if let Some(stop) = self.plan.stops.get(self.stops_reached) {
            if stop.position <= authority_end + POSITION_EPSILON {
                return (stop.position, Halt::Stop(self.stops_reached));
            }
        }
        if self.authority < self.plan.routes.len() {
            (authority_end, Halt::AuthorityEnd)
        } else {
            (self.plan.length, Halt::PathEnd)
        }
    }

    pub(crate) fn sync(&mut self, time: SimTime) {
        if let Some(leg) = &self.leg {
            let state = leg.state_at(time);
            self.position = state.position;
            self.speed = state.speed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schedule::{RouteSpan, ScheduledStop};
    use railsim_core::RouteId;
    use railsim_envelope::{EnvelopePart, EnvelopeSource};
    use railsim_physics::{
        GradedPath, RollingResistance, RollingStock, TractiveEffortCurve, TractivePoint,
    };

    fn plan(stops: &[f64]) -> TrainPlan {
        let stock = RollingStock {
            id: "unit".into(),
            length: 50.0,
            mass: 100_000.0,
            inertia_coefficient: 1.0,
            max_speed: 20.0,
            rolling_resistance: RollingResistance {
                a: 0.0,
                b: 0.0,
                c: 0.0,
            },
            tractive_effort: TractiveEffortCurve::new(Vec::<TractivePoint>::new()),
            service_deceleration: 0.5,
        };
        TrainPlan {
            id: TrainId(0),
            name: "unit".into(),
            stock: Arc::new(stock),
            departure_time: 0.0,
            initial_speed: 0.0,
            routes: vec![
                RouteSpan {
                    route: RouteId(0),
                    begin: 0.0,
                    end: 1_000.0,
                },
                RouteSpan {
                    route: RouteId(1),
                    begin: 1_000.0,
                    end: 3_000.0,
                },
            ],
            sections: Vec::new(),
            path: GradedPath::new(3_000.0, Vec::new()).unwrap(),
            length: 3_000.0,
            stops: stops
                .iter()
                .map(|p| ScheduledStop {
                    position: *p,
                    duration: 10.0,
                })
                .collect(),
            speed_limits: Vec::new(),
            allowances: Vec::new(),
        }
    }

    // ── Halts ──────────────────────────────────────────────────

    #[test]
    fn halt_is_the_nearest_constraint() {
        let mut train = Train::new(plan(&[2_000.0]));
        train.authority = 1;
        assert_eq!(train.next_halt(), (1_000.0, Halt::AuthorityEnd));
        train.authority = 2;
        assert_eq!(train.next_halt(), (2_000.0, Halt::Stop(0)));
        train.stops_reached = 1;
        assert_eq!(train.next_halt(), (3_000.0, Halt::PathEnd));
    }

    #[test]
    fn stop_at_authority_end_wins() {
        let mut train = Train::new(plan(&[1_000.0]));
        train.authority = 1;
        assert_eq!(train.next_halt(), (1_000.0, Halt::Stop(0)));
    }

    // ── Legs ───────────────────────────────────────────────────

    #[test]
    fn leg_state_is_clamped() {
        let part = EnvelopePart::constant(EnvelopeSource::TrainLimit, 0.0, 100.0, 10.0).unwrap();
        let leg = Leg {
            start_time: 50.0,
            envelope: Envelope::new(vec![part]).unwrap(),
            halt: Halt::PathEnd,
        };
        assert!((leg.end_time() - 60.0).abs() < 1e-9);
        assert!((leg.state_at(55.0).position - 50.0).abs() < 1e-6);
        assert_eq!(leg.state_at(10.0).position, 0.0);
        assert!((leg.state_at(99.0).position - 100.0).abs() < 1e-9);
        assert!((leg.time_at(20.0).unwrap() - 52.0).abs() < 1e-9);
    }
}
