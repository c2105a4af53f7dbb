//! The static infrastructure graph.
//!
//! Sections, routes, and signals live in three flat arenas. Cross
//! references are handles into those arenas, never pointers, so the
//! graph has no ownership cycles and serializes as plain tables.

use indexmap::IndexMap;
use railsim_core::{RouteId, SignalId, TvdSectionId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::aspect::AspectSet;

/// A track vacancy detection section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TvdSection {
    /// Arena handle.
    pub id: TvdSectionId,
    /// Name in the source description.
    pub name: String,
    /// Routes whose path crosses this section, in route order.
    pub routes: SmallVec<[RouteId; 4]>,
}

/// One traversal of a TVD section by a route.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TvdSectionPath {
    /// The section crossed.
    pub section: TvdSectionId,
    /// Distance covered inside the section.
    pub length: f64,
}

/// A lockable path between two signals (or a model boundary).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Arena handle.
    pub id: RouteId,
    /// Name in the source description.
    pub name: String,
    /// Sections crossed, in running order.
    pub path: SmallVec<[TvdSectionPath; 4]>,
    /// Signal protecting the route entrance, `None` at a boundary.
    pub entry_signal: Option<SignalId>,
    /// Signal at the route exit, `None` at a buffer stop or boundary.
    pub exit_signal: Option<SignalId>,
    /// Sum of the section path lengths.
    pub length: f64,
}

impl Route {
    /// First section of the route.
    pub fn first_section(&self) -> TvdSectionId {
        self.path[0].section
    }

    /// Last section of the route.
    pub fn last_section(&self) -> TvdSectionId {
        self.path[self.path.len() - 1].section
    }

    /// Whether the route crosses `section`.
    pub fn crosses(&self, section: TvdSectionId) -> bool {
        self.path.iter().any(|p| p.section == section)
    }
}

/// A lineside signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Arena handle.
    pub id: SignalId,
    /// Name in the source description.
    pub name: String,
    /// Aspects this signal can display.
    pub aspects: AspectSet,
    /// Routes starting at this signal.
    pub routes: SmallVec<[RouteId; 2]>,
    /// Signals whose routes end at this one. Their aspects depend on
    /// this signal's aspect.
    pub previous_signals: SmallVec<[SignalId; 2]>,
}

/// The validated infrastructure graph.
///
/// Built by [`InfraBuilder`](crate::InfraBuilder). Immutable; the
/// mutable interlocking state lives in [`InfraState`](crate::InfraState).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Infra {
    pub(crate) sections: Vec<TvdSection>,
    pub(crate) routes: Vec<Route>,
    pub(crate) signals: Vec<Signal>,
    pub(crate) section_names: IndexMap<String, TvdSectionId>,
    pub(crate) route_names: IndexMap<String, RouteId>,
    pub(crate) signal_names: IndexMap<String, SignalId>,
}

impl Infra {
    /// All sections, indexed by [`TvdSectionId`].
    pub fn sections(&self) -> &[TvdSection] {
        &self.sections
    }

    /// All routes, indexed by [`RouteId`].
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// All signals, indexed by [`SignalId`].
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Section by handle.
    pub fn section(&self, id: TvdSectionId) -> Option<&TvdSection> {
        self.sections.get(id.index())
    }

    /// Route by handle.
    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.index())
    }

    /// Signal by handle.
    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        self.signals.get(id.index())
    }

    /// Section handle by name.
    pub fn section_by_name(&self, name: &str) -> Option<TvdSectionId> {
        self.section_names.get(name).copied()
    }

    /// Route handle by name.
    pub fn route_by_name(&self, name: &str) -> Option<RouteId> {
        self.route_names.get(name).copied()
    }

    /// Signal handle by name.
    pub fn signal_by_name(&self, name: &str) -> Option<SignalId> {
        self.signal_names.get(name).copied()
    }

    /// Routes that share at least one section with `route`, excluding
    /// `route` itself.
    pub fn conflicting_routes(&self, route: RouteId) -> Vec<RouteId> {
        let Some(r) = self.route(route) else {
            return Vec::new();
        };
        let mut conflicts: Vec<RouteId> = r
            .path
            .iter()
            .filter_map(|p| self.section(p.section))
            .flat_map(|s| s.routes.iter().copied())
            .filter(|other| *other != route)
            .collect();
        conflicts.sort_unstable();
        conflicts.dedup();
        conflicts
    }
}
