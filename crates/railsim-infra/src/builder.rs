//! Incremental construction of an [`Infra`] graph.

use indexmap::IndexMap;
use railsim_core::{LoadError, RouteId, SignalId, TvdSectionId};
use smallvec::SmallVec;

use crate::aspect::AspectSet;
use crate::graph::{Infra, Route, Signal, TvdSection, TvdSectionPath};

/// Builds and validates an [`Infra`].
///
/// Entities are registered by unique name and receive consecutive
/// handles in registration order. Back references (routes crossing a
/// section, routes starting at a signal, upstream signals) are derived
/// by [`build`](Self::build).
///
/// # Example
///
/// ```
/// use railsim_infra::{AspectSet, InfraBuilder};
///
/// let mut builder = InfraBuilder::new();
/// let s0 = builder.add_section("S0").unwrap();
/// let s1 = builder.add_section("S1").unwrap();
/// let sig = builder.add_signal("SIG1", AspectSet::ALL).unwrap();
/// builder.add_route("R0", &[(s0, 800.0)], None, Some(sig)).unwrap();
/// builder.add_route("R1", &[(s1, 1200.0)], Some(sig), None).unwrap();
/// let infra = builder.build().unwrap();
/// assert_eq!(infra.routes().len(), 2);
/// assert_eq!(infra.signals()[0].previous_signals.len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InfraBuilder {
    sections: IndexMap<String, TvdSectionId>,
    signals: IndexMap<String, (SignalId, AspectSet)>,
    routes: Vec<Route>,
    route_names: IndexMap<String, RouteId>,
}

impl InfraBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TVD section.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidInfra`] if the name is already taken.
    pub fn add_section(&mut self, name: impl Into<String>) -> Result<TvdSectionId, LoadError> {
        let name = name.into();
        if self.sections.contains_key(&name) {
            return Err(duplicate("section", &name));
        }
        let id = TvdSectionId(self.sections.len() as u32);
        self.sections.insert(name, id);
        Ok(id)
    }

    /// Register a signal able to display `aspects`.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidInfra`] if the name is already taken.
    pub fn add_signal(
        &mut self,
        name: impl Into<String>,
        aspects: AspectSet,
    ) -> Result<SignalId, LoadError> {
        let name = name.into();
        if self.signals.contains_key(&name) {
            return Err(duplicate("signal", &name));
        }
        let id = SignalId(self.signals.len() as u32);
        self.signals.insert(name, (id, aspects));
        Ok(id)
    }

    /// Register a route crossing `path`, given as `(section, length)`
    /// pairs in running order.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidInfra`] for a duplicate name, an empty path,
    /// a non-positive length, a repeated or unknown section, an unknown
    /// signal, or identical entry and exit signals.
    pub fn add_route(
        &mut self,
        name: impl Into<String>,
        path: &[(TvdSectionId, f64)],
        entry_signal: Option<SignalId>,
        exit_signal: Option<SignalId>,
    ) -> Result<RouteId, LoadError> {
        let name = name.into();
        if self.route_names.contains_key(&name) {
            return Err(duplicate("route", &name));
        }
        let invalid = |reason: String| LoadError::InvalidInfra {
            reason: format!("route '{name}': {reason}"),
        };
        if path.is_empty() {
            return Err(invalid("empty path".into()));
        }
        let mut sections: SmallVec<[TvdSectionPath; 4]> = SmallVec::with_capacity(path.len());
        for &(section, length) in path {
            if section.index() >= self.sections.len() {
                return Err(invalid(format!("unknown {section}")));
            }
            if !length.is_finite() || length <= 0.0 {
                return Err(invalid(format!("{section} has length {length}")));
            }
            if sections.iter().any(|p| p.section == section) {
                return Err(invalid(format!("{section} crossed twice")));
            }
            sections.push(TvdSectionPath { section, length });
        }
        for signal in [entry_signal, exit_signal].into_iter().flatten() {
            if signal.index() >= self.signals.len() {
                return Err(invalid(format!("unknown {signal}")));
            }
        }
        if entry_signal.is_some() && entry_signal == exit_signal {
            return Err(invalid("entry and exit signals are the same".into()));
        }

        let id = RouteId(self.routes.len() as u32);
        self.routes.push(Route {
            id,
            name: name.clone(),
            length: sections.iter().map(|p| p.length).sum(),
            path: sections,
            entry_signal,
            exit_signal,
        });
        self.route_names.insert(name, id);
        Ok(id)
    }

    /// Derive back references and freeze the graph.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidInfra`] if no route was registered.
    pub fn build(self) -> Result<Infra, LoadError> {
        if self.routes.is_empty() {
            return Err(LoadError::InvalidInfra {
                reason: "infrastructure has no routes".into(),
            });
        }

        let mut sections: Vec<TvdSection> = self
            .sections
            .iter()
            .map(|(name, &id)| TvdSection {
                id,
                name: name.clone(),
                routes: SmallVec::new(),
            })
            .collect();
        let mut signals: Vec<Signal> = self
            .signals
            .iter()
            .map(|(name, &(id, aspects))| Signal {
                id,
                name: name.clone(),
                aspects,
                routes: SmallVec::new(),
                previous_signals: SmallVec::new(),
            })
            .collect();

        for route in &self.routes {
            for p in &route.path {
                sections[p.section.index()].routes.push(route.id);
            }
            if let Some(entry) = route.entry_signal {
                signals[entry.index()].routes.push(route.id);
            }
            if let (Some(entry), Some(exit)) = (route.entry_signal, route.exit_signal) {
                let previous = &mut signals[exit.index()].previous_signals;
                if !previous.contains(&entry) {
                    previous.push(entry);
                }
            }
        }

        Ok(Infra {
            sections,
            routes: self.routes,
            section_names: self.sections,
            route_names: self.route_names,
            signal_names: self
                .signals
                .into_iter()
                .map(|(name, (id, _))| (name, id))
                .collect(),
            signals,
        })
    }
}

fn duplicate(kind: &str, name: &str) -> LoadError {
    LoadError::InvalidInfra {
        reason: format!("duplicate {kind} name '{name}'"),
    }
}
