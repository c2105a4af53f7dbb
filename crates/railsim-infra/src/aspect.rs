//! Per-signal sets of displayable aspects.

use std::fmt;

use railsim_core::Aspect;
use serde::{Deserialize, Serialize};

const fn bit(aspect: Aspect) -> u8 {
    match aspect {
        Aspect::Stop => 1,
        Aspect::Warning => 2,
        Aspect::Clear => 4,
    }
}

const ORDERED: [Aspect; 3] = [Aspect::Stop, Aspect::Warning, Aspect::Clear];

/// The aspects a signal can physically display.
///
/// [`Aspect::Stop`] is always part of the set. When the interlocking
/// computes an aspect the signal cannot show, [`resolve`](Self::resolve)
/// falls back to the most permissive supported aspect that is no more
/// permissive than the computed one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Aspect>", into = "Vec<Aspect>")]
pub struct AspectSet(u8);

impl AspectSet {
    /// Stop, warning, and clear.
    pub const ALL: Self = Self(bit(Aspect::Stop) | bit(Aspect::Warning) | bit(Aspect::Clear));
    /// Stop and clear only.
    pub const TWO_ASPECT: Self = Self(bit(Aspect::Stop) | bit(Aspect::Clear));
    /// A signal that can only show stop.
    pub const STOP_ONLY: Self = Self(bit(Aspect::Stop));

    /// A set containing `aspects`, plus [`Aspect::Stop`].
    pub fn new(aspects: impl IntoIterator<Item = Aspect>) -> Self {
        aspects
            .into_iter()
            .fold(Self::STOP_ONLY, |set, a| Self(set.0 | bit(a)))
    }

    /// Whether the set contains `aspect`.
    pub fn contains(self, aspect: Aspect) -> bool {
        self.0 & bit(aspect) != 0
    }

    /// The aspect actually displayed when `computed` is wanted.
    pub fn resolve(self, computed: Aspect) -> Aspect {
        ORDERED
            .iter()
            .copied()
            .filter(|a| *a <= computed && self.contains(*a))
            .max()
            .unwrap_or(Aspect::Stop)
    }

    /// Iterate over the contained aspects, most restrictive first.
    pub fn iter(self) -> impl Iterator<Item = Aspect> {
        ORDERED.into_iter().filter(move |a| self.contains(*a))
    }
}

impl Default for AspectSet {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Debug for AspectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<Vec<Aspect>> for AspectSet {
    fn from(aspects: Vec<Aspect>) -> Self {
        Self::new(aspects)
    }
}

impl From<AspectSet> for Vec<Aspect> {
    fn from(set: AspectSet) -> Self {
        set.iter().collect()
    }
}
