//! Rebuilding simulation state from a published change stream.

use std::sync::Arc;

use indexmap::IndexMap;
use railsim_core::{
    Change, ChangeEntry, SimTime, TrainId, TrainLegChange, TrainStatus,
};
use railsim_infra::{Infra, InfraState};
use tracing::trace;

use crate::error::ReplayError;

/// What a change stream says about one train.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainReplica {
    /// Schedule name.
    pub name: String,
    /// Length of the train's path.
    pub path_length: f64,
    /// Number of scheduled stops.
    pub stop_count: usize,
    /// Head position at the last state change.
    pub position: f64,
    /// Speed at the last state change.
    pub speed: f64,
    /// Status at the last state change.
    pub status: TrainStatus,
    /// Stops reached so far.
    pub stops_reached: usize,
    /// The last planned leg.
    pub leg: Option<TrainLegChange>,
}

/// Interlocking and train state reproduced from published changes.
///
/// Entries must be applied in log order, starting at seq 0. Applying
/// the full log of a run leaves the replica's routes, sections, and
/// aspects equal to the run's final [`InfraState`].
#[derive(Clone, Debug)]
pub struct StateReplica {
    infra: InfraState,
    trains: IndexMap<TrainId, TrainReplica>,
    time: SimTime,
    next_seq: u64,
}

impl StateReplica {
    /// A replica of the initial state of a run over `infra`.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Infra`] if the interlocking cannot be built.
    pub fn new(infra: Arc<Infra>) -> Result<Self, ReplayError> {
        // Replicas never cascade: the cascade's own changes are in the log.
        let infra = InfraState::new(infra, Vec::new(), 0)?;
        Ok(Self {
            infra,
            trains: IndexMap::new(),
            time: 0.0,
            next_seq: 0,
        })
    }

    /// Replay a whole log.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub fn from_log<'a>(
        infra: Arc<Infra>,
        entries: impl IntoIterator<Item = &'a ChangeEntry>,
    ) -> Result<Self, ReplayError> {
        let mut replica = Self::new(infra)?;
        for entry in entries {
            replica.apply(entry)?;
        }
        Ok(replica)
    }

    /// Apply the next entry of the log.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Divergence`] for an out-of-order entry, time going
    /// backwards, or a change about an unknown or duplicate train;
    /// [`ReplayError::Apply`] when the interlocking rejects the change.
    pub fn apply(&mut self, entry: &ChangeEntry) -> Result<(), ReplayError> {
        let seq = entry.seq.0;
        if seq != self.next_seq {
            return Err(divergence(seq, format!("expected seq {}", self.next_seq)));
        }
        if entry.time < self.time {
            return Err(divergence(
                seq,
                format!("time {} before {}", entry.time, self.time),
            ));
        }
        match &entry.change {
            Change::TrainCreated(c) => {
                if self.trains.contains_key(&c.train) {
                    return Err(divergence(seq, format!("{} created twice", c.train)));
                }
                self.trains.insert(
                    c.train,
                    TrainReplica {
                        name: c.name.clone(),
                        path_length: c.path_length,
                        stop_count: c.stop_count,
                        position: 0.0,
                        speed: 0.0,
                        status: TrainStatus::Starting,
                        stops_reached: 0,
                        leg: None,
                    },
                );
            }
            Change::TrainState(c) => {
                let train = self.train_mut(seq, c.train)?;
                train.position = c.position;
                train.speed = c.speed;
                train.status = c.status;
            }
            Change::TrainLeg(c) => {
                self.train_mut(seq, c.train)?.leg = Some(c.clone());
            }
            Change::StopReached(c) => {
                let train = self.train_mut(seq, c.train)?;
                train.stops_reached = c.stop_index + 1;
                train.position = c.position;
            }
            infra @ (Change::RouteStatus(_)
            | Change::TvdOccupancy(_)
            | Change::SignalAspect(_)) => {
                self.infra
                    .apply(infra)
                    .map_err(|source| ReplayError::Apply { seq, source })?;
            }
        }
        trace!(seq, kind = ?entry.change.kind(), "change replayed");
        self.time = entry.time;
        self.next_seq += 1;
        Ok(())
    }

    fn train_mut(&mut self, seq: u64, train: TrainId) -> Result<&mut TrainReplica, ReplayError> {
        self.trains
            .get_mut(&train)
            .ok_or_else(|| divergence(seq, format!("{train} changed before creation")))
    }

    /// The reproduced interlocking.
    pub fn infra_state(&self) -> &InfraState {
        &self.infra
    }

    /// One train.
    pub fn train(&self, train: TrainId) -> Option<&TrainReplica> {
        self.trains.get(&train)
    }

    /// Every created train, in creation order.
    pub fn trains(&self) -> impl Iterator<Item = (TrainId, &TrainReplica)> {
        self.trains.iter().map(|(id, t)| (*id, t))
    }

    /// Time of the last applied entry.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Number of entries applied.
    pub fn entries_applied(&self) -> u64 {
        self.next_seq
    }
}

fn divergence(seq: u64, detail: String) -> ReplayError {
    ReplayError::Divergence { seq, detail }
}
