//! Traits at the seam between the kernel and its collaborators.

use crate::change::{Change, ChangeEntry};

/// Receives every change of a simulation run.
///
/// For each change a sink observes exactly one
/// [`change_created`](ChangeSink::change_created) followed, once the
/// producing event has been fully resolved, by exactly one
/// [`change_published`](ChangeSink::change_published). Sinks registered
/// with the same simulation are consulted in registration order.
///
/// Sinks are owned by the simulation driving them, so they must be
/// [`Send`] but never need to be [`Sync`].
pub trait ChangeSink: Send {
    /// The change was registered; its effect is not committed yet.
    ///
    /// Default: ignore.
    fn change_created(&mut self, entry: &ChangeEntry) {
        let _ = entry;
    }

    /// The change was published; its payload is final.
    fn change_published(&mut self, entry: &ChangeEntry);
}

/// Accepts changes produced while mutating simulation state.
///
/// The interlocking and train logic push their mutations through this
/// trait, leaving registration, sequencing, and sink notification to the
/// implementor. The `Vec<Change>` implementation collects changes in
/// order, which is what unit tests use.
pub trait ChangeRecorder {
    /// Register one change.
    fn record(&mut self, change: Change);
}

impl ChangeRecorder for Vec<Change> {
    fn record(&mut self, change: Change) {
        self.push(change);
    }
}
