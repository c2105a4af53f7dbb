//! Rendering the published change stream into a [`SimulationResult`].

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use railsim_core::{
    Change, ChangeEntry, ChangeSink, SimTime, TrainId, TrainLegChange, TrainStatus,
};
use railsim_infra::Infra;
use tracing::{trace, warn};

use crate::result::{
    ResultPosition, ResultRouteStatus, ResultSignalChange, ResultSpeed, ResultStopReach,
    ResultTrain, SimulationResult,
};

/// Samples closer than this are considered the same point.
const SAMPLE_EPSILON: f64 = 1e-6;

#[derive(Debug)]
struct TrainLog {
    name: String,
    train_length: f64,
    stop_count: usize,
    samples: Vec<ResultSpeed>,
    stop_reaches: Vec<ResultStopReach>,
    arrival_time: Option<SimTime>,
}

impl TrainLog {
    /// Forget samples planned past `time`; a later leg supersedes them.
    fn truncate_after(&mut self, time: SimTime) {
        let keep = self
            .samples
            .iter()
            .position(|s| s.time > time + SAMPLE_EPSILON)
            .unwrap_or(self.samples.len());
        self.samples.truncate(keep);
    }

    fn push(&mut self, sample: ResultSpeed) {
        if let Some(last) = self.samples.last() {
            if (last.time - sample.time).abs() <= SAMPLE_EPSILON
                && (last.position - sample.position).abs() <= SAMPLE_EPSILON
            {
                return;
            }
        }
        self.samples.push(sample);
    }

    fn push_leg(&mut self, time: SimTime, leg: &TrainLegChange) {
        self.truncate_after(time);
        for ((position, speed), at) in leg.positions.iter().zip(&leg.speeds).zip(&leg.times) {
            self.push(ResultSpeed {
                time: *at,
                position: *position,
                speed: *speed,
            });
        }
    }

    fn render(&self) -> ResultTrain {
        let head = |s: &ResultSpeed| ResultPosition {
            time: s.time,
            path_offset: s.position,
        };
        let tail = |s: &ResultSpeed| ResultPosition {
            time: s.time,
            path_offset: (s.position - self.train_length).max(0.0),
        };
        ResultTrain {
            stop_count: self.stop_count,
            speeds: self.samples.clone(),
            head_positions: self.samples.iter().map(head).collect(),
            tail_positions: self.samples.iter().map(tail).collect(),
            stop_reaches: self.stop_reaches.clone(),
            arrival_time: self.arrival_time,
        }
    }
}

#[derive(Debug, Default)]
struct Builder {
    trains: IndexMap<TrainId, TrainLog>,
    result: SimulationResult,
    entries: u64,
}

/// A [`ChangeSink`] building a [`SimulationResult`] from published
/// changes.
///
/// Cloning shares the underlying result: hand one clone to the
/// simulation and keep another to read the result once the run is
/// over. Only published changes are rendered, so a result never shows
/// a state the simulation has not committed to.
#[derive(Clone, Debug)]
pub struct ResultLog {
    infra: Arc<Infra>,
    inner: Arc<Mutex<Builder>>,
}

impl ResultLog {
    /// An empty log resolving route and signal names against `infra`.
    pub fn new(infra: Arc<Infra>) -> Self {
        Self {
            infra,
            inner: Arc::new(Mutex::new(Builder::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Builder> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of published entries rendered so far.
    pub fn entries(&self) -> u64 {
        self.lock().entries
    }

    /// A snapshot of the result rendered so far.
    pub fn result(&self) -> SimulationResult {
        let builder = self.lock();
        let mut result = builder.result.clone();
        result.trains = builder
            .trains
            .values()
            .map(|t| (t.name.clone(), t.render()))
            .collect();
        result
    }

    fn route_name(&self, id: railsim_core::RouteId) -> String {
        self.infra
            .route(id)
            .map_or_else(|| id.to_string(), |r| r.name.clone())
    }

    fn signal_name(&self, id: railsim_core::SignalId) -> String {
        self.infra
            .signal(id)
            .map_or_else(|| id.to_string(), |s| s.name.clone())
    }
}

impl ChangeSink for ResultLog {
    fn change_published(&mut self, entry: &ChangeEntry) {
        let time = entry.time;
        // names are resolved before locking the builder
        let route = match &entry.change {
            Change::RouteStatus(c) => Some(self.route_name(c.route)),
            _ => None,
        };
        let signal = match &entry.change {
            Change::SignalAspect(c) => Some(self.signal_name(c.signal)),
            _ => None,
        };
        let mut builder = self.lock();
        builder.entries += 1;
        match &entry.change {
            Change::TrainCreated(c) => {
                let mut log = TrainLog {
                    name: c.name.clone(),
                    train_length: c.train_length,
                    stop_count: c.stop_count,
                    samples: Vec::new(),
                    stop_reaches: Vec::new(),
                    arrival_time: None,
                };
                log.push(ResultSpeed {
                    time: c.departure_time,
                    position: 0.0,
                    speed: c.initial_speed,
                });
                builder.trains.insert(c.train, log);
            }
            Change::TrainLeg(c) => match builder.trains.get_mut(&c.train) {
                Some(log) => log.push_leg(time, c),
                None => warn!(seq = entry.seq.0, train = %c.train, "leg for unknown train"),
            },
            Change::TrainState(c) => match builder.trains.get_mut(&c.train) {
                Some(log) => {
                    // a running train is described by its leg
                    if c.status != TrainStatus::Running && c.status != TrainStatus::Starting {
                        log.truncate_after(time);
                        log.push(ResultSpeed {
                            time,
                            position: c.position,
                            speed: c.speed,
                        });
                    }
                    if c.status == TrainStatus::Arrived {
                        log.arrival_time = Some(time);
                    }
                }
                None => warn!(seq = entry.seq.0, train = %c.train, "state for unknown train"),
            },
            Change::StopReached(c) => match builder.trains.get_mut(&c.train) {
                Some(log) => log.stop_reaches.push(ResultStopReach {
                    time,
                    stop_index: c.stop_index,
                    position: c.position,
                }),
                None => warn!(seq = entry.seq.0, train = %c.train, "stop for unknown train"),
            },
            Change::RouteStatus(c) => builder.result.routes_status.push(ResultRouteStatus {
                time,
                route: route.unwrap_or_default(),
                status: c.to,
            }),
            Change::SignalAspect(c) => builder.result.signal_changes.push(ResultSignalChange {
                time,
                signal: signal.unwrap_or_default(),
                aspect: c.to,
            }),
            Change::TvdOccupancy(_) => {}
        }
        trace!(seq = entry.seq.0, kind = ?entry.change.kind(), "change rendered");
    }
}
