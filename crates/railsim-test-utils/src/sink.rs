//! A change sink that keeps everything it is told.

use std::sync::{Arc, Mutex, MutexGuard};

use railsim_core::{ChangeEntry, ChangeSink};

/// Every notification received, in arrival order.
#[derive(Debug, Default)]
pub struct Collected {
    pub created: Vec<ChangeEntry>,
    pub published: Vec<ChangeEntry>,
    /// `(true, seq)` for a creation, `(false, seq)` for a publication.
    pub order: Vec<(bool, u64)>,
}

/// Records every change notification into a shared [`Collected`].
///
/// The simulation owns the sink; tests keep a clone to inspect it.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock and read the collected notifications.
    pub fn collected(&self) -> MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Published entries serialized as JSON lines.
    pub fn published_json(&self) -> Vec<String> {
        self.collected()
            .published
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect()
    }
}

impl ChangeSink for CollectingSink {
    fn change_created(&mut self, entry: &ChangeEntry) {
        let mut c = self.collected();
        c.order.push((true, entry.seq.0));
        c.created.push(entry.clone());
    }

    fn change_published(&mut self, entry: &ChangeEntry) {
        let mut c = self.collected();
        c.order.push((false, entry.seq.0));
        c.published.push(entry.clone());
    }
}
