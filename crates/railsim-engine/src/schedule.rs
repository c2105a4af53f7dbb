//! Train schedules and their resolution against the infrastructure.
//!
//! A [`TrainSchedule`] names everything by string: its rolling stock,
//! its routes, the sections of its succession tables. Resolution turns
//! it into a [`TrainPlan`] of typed handles and absolute path positions,
//! failing with a [`LoadError`] before any simulation state exists.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use railsim_core::{LoadError, RouteId, SimTime, TrainId, TvdSectionId};
use railsim_infra::{Infra, SuccessionTable};
use railsim_physics::{Allowance, EnvelopeRequest, GradeSection, GradedPath, RollingStock, SpeedLimit};
use serde::{Deserialize, Serialize};

/// A mandatory halt along the path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStop {
    /// Head position of the halted train, from the path start.
    pub position: f64,
    /// Dwell time, in seconds.
    pub duration: f64,
}

/// What one train is asked to do, by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainSchedule {
    /// Unique train name.
    pub name: String,
    /// Id of the [`RollingStock`] running the service.
    pub rolling_stock: String,
    /// When the train enters the simulation.
    pub departure_time: SimTime,
    /// Speed at the path start.
    pub initial_speed: f64,
    /// Route names in running order; each route's exit signal is the
    /// next one's entry signal.
    pub routes: Vec<String>,
    /// Stops in running order.
    #[serde(default)]
    pub stops: Vec<ScheduledStop>,
    /// Track speed limits, in path positions.
    #[serde(default)]
    pub speed_limits: Vec<SpeedLimit>,
    /// Gradients, in path positions.
    #[serde(default)]
    pub grades: Vec<GradeSection>,
    /// Scheduling margins over the whole path.
    #[serde(default)]
    pub allowances: Vec<Allowance>,
}

/// A succession table naming its section and trains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSuccessionTable {
    /// TVD section name.
    pub section: String,
    /// Train names in passing order.
    pub trains: Vec<String>,
}

/// A route of a [`TrainPlan`] and the path range it covers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteSpan {
    /// The route.
    pub route: RouteId,
    /// Path position of its start.
    pub begin: f64,
    /// Path position of its end.
    pub end: f64,
}

/// A TVD section crossed by a [`TrainPlan`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionSpan {
    /// The section.
    pub section: TvdSectionId,
    /// Index of the owning route in [`TrainPlan::routes`].
    pub route_index: usize,
    /// Path position of its start.
    pub begin: f64,
    /// Path position of its end.
    pub end: f64,
}

/// A schedule resolved against the infrastructure and rolling stock.
///
/// Positions are measured along the train's own path, which starts at
/// the beginning of its first route.
#[derive(Clone, Debug)]
pub struct TrainPlan {
    /// Handle of the train.
    pub id: TrainId,
    /// Schedule name.
    pub name: String,
    /// The rolling stock.
    pub stock: Arc<RollingStock>,
    /// When the train enters the simulation.
    pub departure_time: SimTime,
    /// Speed at the path start.
    pub initial_speed: f64,
    /// Routes in running order.
    pub routes: Vec<RouteSpan>,
    /// Sections in running order.
    pub sections: Vec<SectionSpan>,
    /// Gradient profile of the path.
    pub path: GradedPath,
    /// Total path length.
    pub length: f64,
    /// Stops in running order.
    pub stops: Vec<ScheduledStop>,
    /// Track speed limits.
    pub speed_limits: Vec<SpeedLimit>,
    /// Scheduling margins.
    pub allowances: Vec<Allowance>,
}

impl TrainPlan {
    /// Resolve `schedule` as train `id`.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidRollingStock`] for an unknown stock id, and
    /// [`LoadError::InvalidSchedule`] for an empty or unknown route, a
    /// route not starting where the previous one ends, a departure
    /// before `start_time`, an unusable initial speed, stops outside
    /// the path or out of order, or an invalid limit or gradient.
    pub fn resolve(
        id: TrainId,
        schedule: &TrainSchedule,
        infra: &Infra,
        stocks: &IndexMap<String, Arc<RollingStock>>,
        start_time: SimTime,
    ) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::InvalidSchedule {
            train: schedule.name.clone(),
            reason,
        };
        let stock = stocks
            .get(&schedule.rolling_stock)
            .cloned()
            .ok_or_else(|| LoadError::InvalidRollingStock {
                id: schedule.rolling_stock.clone(),
                reason: format!("unknown, referenced by train '{}'", schedule.name),
            })?;

        if schedule.routes.is_empty() {
            return Err(invalid("no routes".into()));
        }
        let mut routes = Vec::with_capacity(schedule.routes.len());
        let mut sections = Vec::new();
        let mut position = 0.0;
        let mut previous_exit = None;
        for (route_index, name) in schedule.routes.iter().enumerate() {
            let route = infra
                .route_by_name(name)
                .and_then(|r| infra.route(r))
                .ok_or_else(|| invalid(format!("unknown route '{name}'")))?;
            if route_index > 0 && (previous_exit.is_none() || previous_exit != route.entry_signal) {
                return Err(invalid(format!(
                    "route '{name}' does not start where '{}' ends",
                    schedule.routes[route_index - 1]
                )));
            }
            previous_exit = route.exit_signal;
            let begin = position;
            for p in &route.path {
                if sections.iter().any(|s: &SectionSpan| s.section == p.section) {
                    return Err(invalid(format!("{} crossed twice", p.section)));
                }
                sections.push(SectionSpan {
                    section: p.section,
                    route_index,
                    begin: position,
                    end: position + p.length,
                });
                position += p.length;
            }
            routes.push(RouteSpan {
                route: route.id,
                begin,
                end: position,
            });
        }
        let length = position;

        if !schedule.departure_time.is_finite() || schedule.departure_time < start_time {
            return Err(invalid(format!(
                "departure {} is before the simulation start {start_time}",
                schedule.departure_time
            )));
        }
        let v0 = schedule.initial_speed;
        if !v0.is_finite() || v0 < 0.0 || v0 > stock.max_speed {
            return Err(invalid(format!("initial speed {v0} is out of range")));
        }

        let mut previous = 0.0;
        for (i, stop) in schedule.stops.iter().enumerate() {
            if !(stop.position > previous && stop.position <= length) {
                return Err(invalid(format!(
                    "stop {i} at {} is not after {previous} within the path",
                    stop.position
                )));
            }
            if !stop.duration.is_finite() || stop.duration < 0.0 {
                return Err(invalid(format!("stop {i} has dwell {}", stop.duration)));
            }
            previous = stop.position;
        }

        for limit in &schedule.speed_limits {
            let placed = limit.begin >= 0.0 && limit.end <= length && limit.begin < limit.end;
            if !placed || !(limit.speed.is_finite() && limit.speed > 0.0) {
                return Err(invalid(format!(
                    "speed limit {} on [{}, {}] is unusable",
                    limit.speed, limit.begin, limit.end
                )));
            }
        }
        for allowance in &schedule.allowances {
            if !allowance.value.is_finite() || allowance.value < 0.0 {
                return Err(invalid(format!("allowance value {}", allowance.value)));
            }
        }
        let path = GradedPath::new(length, schedule.grades.clone())
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            id,
            name: schedule.name.clone(),
            stock,
            departure_time: schedule.departure_time,
            initial_speed: v0,
            routes,
            sections,
            path,
            length,
            stops: schedule.stops.clone(),
            speed_limits: schedule.speed_limits.clone(),
            allowances: schedule.allowances.clone(),
        })
    }

    /// The request for the whole path as scheduled, allowances included.
    pub fn nominal_request(&self) -> EnvelopeRequest {
        EnvelopeRequest::full_path(self.length)
            .with_speed_limits(self.speed_limits.clone())
            .with_stops(self.stops.iter().map(|s| s.position).collect())
            .with_allowances(self.allowances.clone())
            .with_initial_speed(self.initial_speed)
    }

    /// Dwell time of every stop strictly before `position`.
    pub fn dwell_before(&self, position: f64) -> f64 {
        self.stops
            .iter()
            .take_while(|s| s.position < position)
            .map(|s| s.duration)
            .sum()
    }
}

/// Validate `stocks` and index them by id.
///
/// # Errors
///
/// [`LoadError::InvalidRollingStock`] for a duplicate id or a stock
/// that does not validate.
pub(crate) fn index_rolling_stock(
    stocks: &[RollingStock],
) -> Result<IndexMap<String, Arc<RollingStock>>, LoadError> {
    let mut index = IndexMap::with_capacity(stocks.len());
    for stock in stocks {
        stock.validate()?;
        if index
            .insert(stock.id.clone(), Arc::new(stock.clone()))
            .is_some()
        {
            return Err(LoadError::InvalidRollingStock {
                id: stock.id.clone(),
                reason: "duplicate id".into(),
            });
        }
    }
    Ok(index)
}

/// Resolve named succession tables to typed handles.
///
/// # Errors
///
/// [`LoadError::InvalidSuccession`] for an unknown section, an unknown
/// train, or a train listed twice.
pub(crate) fn resolve_successions(
    tables: &[NamedSuccessionTable],
    infra: &Infra,
    trains: &IndexMap<String, TrainId>,
) -> Result<Vec<SuccessionTable>, LoadError> {
    tables
        .iter()
        .map(|table| {
            let invalid = |reason: String| LoadError::InvalidSuccession {
                section: table.section.clone(),
                reason,
            };
            let section = infra
                .section_by_name(&table.section)
                .ok_or_else(|| invalid("unknown section".into()))?;
            let mut seen = HashSet::with_capacity(table.trains.len());
            let mut order = Vec::with_capacity(table.trains.len());
            for name in &table.trains {
                let train = *trains
                    .get(name)
                    .ok_or_else(|| invalid(format!("unknown train '{name}'")))?;
                if !seen.insert(train) {
                    return Err(invalid(format!("train '{name}' listed twice")));
                }
                order.push(train);
            }
            Ok(SuccessionTable::new(section, order))
        })
        .collect()
}
