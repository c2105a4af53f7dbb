//! Time-ordered event queue with deterministic tie-breaking.
//!
//! [`EventQueue`] holds every [`TimelineEvent`] in the `Scheduled`
//! state. Events are totally ordered by the composite key
//! `(time, id)`: ids come from a monotonic counter that persists for
//! the lifetime of the queue, so events scheduled for the same instant
//! pop in submission order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use railsim_core::{EventId, SimTime, TrainId};

use crate::event::{EventKind, EventState, TimelineEvent};

#[derive(Clone, Copy, Debug)]
struct QueueKey {
    time: SimTime,
    id: EventId,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.id.cmp(&other.id))
    }
}

/// Pending events of one simulation, earliest first.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<QueueKey, TimelineEvent>,
    keys: HashMap<EventId, QueueKey>,
    next_id: u64,
}

impl EventQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` for `train` at `time` and return its handle.
    pub fn schedule(&mut self, time: SimTime, train: TrainId, kind: EventKind) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let key = QueueKey { time, id };
        self.events.insert(
            key,
            TimelineEvent {
                id,
                time,
                train,
                kind,
                state: EventState::Scheduled,
            },
        );
        self.keys.insert(id, key);
        id
    }

    /// Remove a scheduled event before it happens.
    ///
    /// Returns the event in the `Cancelled` state, or `None` if `id` is
    /// not pending (already popped or cancelled).
    pub fn cancel(&mut self, id: EventId) -> Option<TimelineEvent> {
        let key = self.keys.remove(&id)?;
        let mut event = self.events.remove(&key)?;
        event.state = EventState::Cancelled;
        Some(event)
    }

    /// Remove the earliest event, marked `Happened`.
    pub fn pop(&mut self) -> Option<TimelineEvent> {
        let (_, mut event) = self.events.pop_first()?;
        self.keys.remove(&event.id);
        event.state = EventState::Happened;
        Some(event)
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.first_key_value().map(|(k, _)| k.time)
    }

    /// The pending event `id`, if any.
    pub fn get(&self, id: EventId) -> Option<&TimelineEvent> {
        self.keys.get(&id).and_then(|k| self.events.get(k))
    }

    /// Pending events in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.values()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
