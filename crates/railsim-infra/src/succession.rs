//! Succession tables: the order in which trains may take a section.

use std::collections::HashSet;

use railsim_core::{LoadError, TrainId, TvdSectionId};
use serde::{Deserialize, Serialize};

use crate::graph::Infra;

/// Imposed passing order of trains through one TVD section.
///
/// A train listed in the table may only be granted a route crossing
/// the section once every train listed before it has been granted one.
/// Trains absent from the table are not constrained by it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessionTable {
    /// The contested section.
    pub section: TvdSectionId,
    /// Trains in passing order.
    pub order: Vec<TrainId>,
}

impl SuccessionTable {
    /// A table for `section`.
    pub fn new(section: TvdSectionId, order: Vec<TrainId>) -> Self {
        Self { section, order }
    }

    /// Position of `train` in the passing order.
    pub fn rank_of(&self, train: TrainId) -> Option<usize> {
        self.order.iter().position(|t| *t == train)
    }

    /// Check the table against `infra`.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidSuccession`] for an unknown section or a
    /// train listed twice.
    pub fn validate(&self, infra: &Infra) -> Result<(), LoadError> {
        let Some(section) = infra.section(self.section) else {
            return Err(LoadError::InvalidSuccession {
                section: self.section.to_string(),
                reason: "unknown section".into(),
            });
        };
        let mut seen = HashSet::with_capacity(self.order.len());
        for train in &self.order {
            if !seen.insert(*train) {
                return Err(LoadError::InvalidSuccession {
                    section: section.name.clone(),
                    reason: format!("{train} listed twice"),
                });
            }
        }
        Ok(())
    }
}

/// Progress of the trains through one [`SuccessionTable`].
#[derive(Clone, Debug)]
pub(crate) struct SuccessionCursor {
    table: SuccessionTable,
    next: usize,
}

impl SuccessionCursor {
    pub(crate) fn new(table: SuccessionTable) -> Self {
        Self { table, next: 0 }
    }

    /// The listed train whose turn it is.
    pub(crate) fn expected(&self) -> Option<TrainId> {
        self.table.order.get(self.next).copied()
    }

    pub(crate) fn permits(&self, train: TrainId) -> bool {
        match self.table.rank_of(train) {
            Some(rank) => rank == self.next,
            None => true,
        }
    }

    pub(crate) fn rank_of(&self, train: TrainId) -> Option<usize> {
        self.table.rank_of(train)
    }

    pub(crate) fn advance(&mut self, train: TrainId) {
        if self.expected() == Some(train) {
            self.next += 1;
        }
    }
}
