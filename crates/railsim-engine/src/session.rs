//! Interactive control surface over a [`Simulation`].
//!
//! A [`Session`] is what a front end drives step by step:
//!
//! ```text
//! Uninitialized --init--> Initialized --create_simulation--> Paused
//!                              ^                               |  ^
//!                              |                      run_until|  |event matched
//!                              |                               v  |
//!                              +------ over or failed ------ Running
//! ```
//!
//! Watched change kinds are buffered as they are published and drained
//! with [`take_watched`](Session::take_watched).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use railsim_core::{ChangeEntry, ChangeKind, ChangeSink};
use railsim_infra::Infra;
use railsim_physics::RollingStock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::error::{SessionError, SetupError};
use crate::event::{EventType, TimelineEvent};
use crate::schedule::{NamedSuccessionTable, TrainSchedule};
use crate::simulation::Simulation;

/// Where a [`Session`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No infrastructure loaded.
    Uninitialized,
    /// Infrastructure and rolling stock loaded, no active run.
    Initialized,
    /// Events are being resolved.
    Running,
    /// A run is active and waiting for the next `run_until`.
    Paused,
}

#[derive(Debug, Default)]
struct Watch {
    kinds: HashSet<ChangeKind>,
    buffer: Vec<ChangeEntry>,
}

struct WatchSink(Arc<Mutex<Watch>>);

impl ChangeSink for WatchSink {
    fn change_published(&mut self, entry: &ChangeEntry) {
        let mut watch = lock(&self.0);
        if watch.kinds.contains(&entry.change.kind()) {
            watch.buffer.push(entry.clone());
        }
    }
}

fn lock(watch: &Mutex<Watch>) -> MutexGuard<'_, Watch> {
    watch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct Loaded {
    infra: Arc<Infra>,
    rolling_stock: Vec<RollingStock>,
    config: SimulationConfig,
}

/// A stateful wrapper that loads inputs once and runs simulations over
/// them on demand.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    loaded: Option<Loaded>,
    simulation: Option<Simulation>,
    watch: Arc<Mutex<Watch>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An uninitialized session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            loaded: None,
            simulation: None,
            watch: Arc::new(Mutex::new(Watch::default())),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Load the infrastructure, rolling stock, and configuration used
    /// by every later simulation. Drops any active run.
    ///
    /// # Errors
    ///
    /// [`SessionError::Setup`] if `config` does not validate, or a
    /// rolling stock does not validate.
    pub fn init(
        &mut self,
        infra: Arc<Infra>,
        rolling_stock: Vec<RollingStock>,
        config: SimulationConfig,
    ) -> Result<(), SessionError> {
        config.validate().map_err(SetupError::from)?;
        for stock in &rolling_stock {
            stock.validate().map_err(SetupError::from)?;
        }
        info!(
            routes = infra.routes().len(),
            rolling_stock = rolling_stock.len(),
            "session initialized"
        );
        self.loaded = Some(Loaded {
            infra,
            rolling_stock,
            config,
        });
        self.simulation = None;
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Build a simulation of `schedules` and pause before its first
    /// event. `sinks` receive every change of the run, after the watch
    /// buffer.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedState`] unless `Initialized`, or
    /// [`SessionError::Setup`] for inconsistent inputs, in which case
    /// the session stays `Initialized`.
    pub fn create_simulation(
        &mut self,
        schedules: &[TrainSchedule],
        successions: &[NamedSuccessionTable],
        sinks: Vec<Box<dyn ChangeSink>>,
    ) -> Result<(), SessionError> {
        self.expect_state(SessionState::Initialized)?;
        let Some(loaded) = &self.loaded else {
            return Err(SessionError::UnexpectedState {
                expected: SessionState::Initialized,
                got: SessionState::Uninitialized,
            });
        };
        let mut simulation = Simulation::new(
            Arc::clone(&loaded.infra),
            &loaded.rolling_stock,
            schedules,
            successions,
            loaded.config.clone(),
        )?;
        simulation.add_sink(Box::new(WatchSink(Arc::clone(&self.watch))));
        for sink in sinks {
            simulation.add_sink(sink);
        }
        lock(&self.watch).buffer.clear();
        self.simulation = Some(simulation);
        self.state = SessionState::Paused;
        Ok(())
    }

    /// Resolve events until one of `types` happens.
    ///
    /// Returns the matching event and pauses, or returns `None` when
    /// the run is over; the session is then `Initialized` again, with
    /// the finished simulation still readable.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedState`] unless `Paused`, or
    /// [`SessionError::Simulation`] if the run fails, which also
    /// returns the session to `Initialized`.
    pub fn run_until(&mut self, types: &[EventType]) -> Result<Option<TimelineEvent>, SessionError> {
        self.expect_state(SessionState::Paused)?;
        let Some(simulation) = self.simulation.as_mut() else {
            return Err(SessionError::UnexpectedState {
                expected: SessionState::Paused,
                got: SessionState::Initialized,
            });
        };
        self.state = SessionState::Running;
        match simulation.run_until(types) {
            Ok(Some(event)) => {
                self.state = SessionState::Paused;
                Ok(Some(event))
            }
            Ok(None) => {
                self.state = SessionState::Initialized;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "session run failed");
                self.state = SessionState::Initialized;
                Err(e.into())
            }
        }
    }

    /// Forward published changes of `kinds` to the watch buffer from
    /// now on, replacing the previous selection.
    pub fn watch(&mut self, kinds: &[ChangeKind]) {
        lock(&self.watch).kinds = kinds.iter().copied().collect();
    }

    /// Drain the watched changes published so far.
    pub fn take_watched(&mut self) -> Vec<ChangeEntry> {
        std::mem::take(&mut lock(&self.watch).buffer)
    }

    /// Delay of every departed train of the current or last run, by
    /// train name.
    pub fn train_delays(&self) -> Vec<(String, f64)> {
        let Some(simulation) = &self.simulation else {
            return Vec::new();
        };
        simulation
            .trains()
            .iter()
            .filter_map(|t| {
                simulation
                    .train_delay(t.id())
                    .map(|delay| (t.name().to_string(), delay))
            })
            .collect()
    }

    /// The current or last simulation.
    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::UnexpectedState {
                expected,
                got: self.state,
            })
        }
    }
}
