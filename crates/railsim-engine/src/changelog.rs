//! The change publication protocol.
//!
//! While one event is resolved, every mutation is registered with the
//! [`ChangeLog`] as soon as it happens: it receives the next sequence
//! number, each sink hears `change_created`, and the change is kept
//! pending. When the event is fully resolved, [`flush`](ChangeLog::flush)
//! publishes the pending changes in creation order. A failed event
//! [`discard`](ChangeLog::discard)s them instead, so sinks never see a
//! publication from an aborted resolution.

use std::fmt;

use railsim_core::{Change, ChangeEntry, ChangeRecorder, ChangeSeq, ChangeSink, ChangeState, SimTime};
use tracing::trace;

/// Sequencing and sink multiplexing for the changes of one run.
#[derive(Default)]
pub struct ChangeLog {
    sinks: Vec<Box<dyn ChangeSink>>,
    pending: Vec<ChangeEntry>,
    next_seq: u64,
    published: u64,
    time: SimTime,
}

impl fmt::Debug for ChangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLog")
            .field("sinks", &self.sinks.len())
            .field("pending", &self.pending.len())
            .field("next_seq", &self.next_seq)
            .field("published", &self.published)
            .field("time", &self.time)
            .finish()
    }
}

impl ChangeLog {
    /// A log with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink; sinks are notified in registration order.
    pub fn add_sink(&mut self, sink: Box<dyn ChangeSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Stamp subsequent changes with `time`.
    pub fn set_time(&mut self, time: SimTime) {
        self.time = time;
    }

    /// Changes registered since the last flush.
    pub fn pending(&self) -> &[ChangeEntry] {
        &self.pending
    }

    /// Total number of changes published so far.
    pub fn published_count(&self) -> u64 {
        self.published
    }

    /// Lifecycle position of the change numbered `seq`.
    pub fn state_of(&self, seq: ChangeSeq) -> ChangeState {
        if seq.0 < self.published {
            ChangeState::Published
        } else if seq.0 < self.next_seq {
            ChangeState::Registered
        } else {
            ChangeState::Unregistered
        }
    }

    /// Publish every pending change, oldest first, to every sink.
    ///
    /// Returns the number of changes published.
    pub fn flush(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        for entry in &pending {
            for sink in &mut self.sinks {
                sink.change_published(entry);
            }
            trace!(seq = entry.seq.0, kind = ?entry.change.kind(), "change published");
        }
        self.published += pending.len() as u64;
        pending.len()
    }

    /// Drop every pending change without publishing it.
    ///
    /// Sequence numbers of dropped changes are reused, so the published
    /// stream stays gap-free.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.next_seq = self.published;
        dropped
    }
}

impl ChangeRecorder for ChangeLog {
    fn record(&mut self, change: Change) {
        let entry = ChangeEntry {
            seq: ChangeSeq(self.next_seq),
            time: self.time,
            change,
        };
        self.next_seq += 1;
        for sink in &mut self.sinks {
            sink.change_created(&entry);
        }
        trace!(seq = entry.seq.0, kind = ?entry.change.kind(), "change registered");
        self.pending.push(entry);
    }
}

const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<ChangeLog>();
    }
};
