//! The serializable result of one run.

use indexmap::IndexMap;
use railsim_core::{Aspect, RouteStatus, SimTime};
use serde::{Deserialize, Serialize};

use crate::error::OutputError;
use crate::simplify::{chord_distance, rdp, SimplifyTolerance};

/// A speed sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSpeed {
    /// Simulated time.
    pub time: SimTime,
    /// Head position along the path.
    pub position: f64,
    /// Speed at that position.
    pub speed: f64,
}

/// A position sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultPosition {
    /// Simulated time.
    pub time: SimTime,
    /// Offset along the train's path.
    pub path_offset: f64,
}

/// A scheduled stop reached.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultStopReach {
    /// Simulated time of arrival at the stop.
    pub time: SimTime,
    /// Index of the stop in the schedule.
    pub stop_index: usize,
    /// Position of the stop along the path.
    pub position: f64,
}

/// Everything recorded about one train.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTrain {
    /// Number of scheduled stops.
    pub stop_count: usize,
    /// Speed curve.
    pub speeds: Vec<ResultSpeed>,
    /// Head position over time.
    pub head_positions: Vec<ResultPosition>,
    /// Tail position over time, clamped at the path start.
    pub tail_positions: Vec<ResultPosition>,
    /// Stops reached, in order.
    pub stop_reaches: Vec<ResultStopReach>,
    /// Time the head reached the end of the path.
    pub arrival_time: Option<SimTime>,
}

/// A route status transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRouteStatus {
    /// Simulated time.
    pub time: SimTime,
    /// Route name.
    pub route: String,
    /// Status after the transition.
    pub status: RouteStatus,
}

/// A signal aspect transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSignalChange {
    /// Simulated time.
    pub time: SimTime,
    /// Signal name.
    pub signal: String,
    /// Aspect after the transition.
    pub aspect: Aspect,
}

/// The rendered record of one run, keyed by train name in creation
/// order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Per-train curves and stop reaches.
    pub trains: IndexMap<String, ResultTrain>,
    /// Every route status transition, in publication order.
    pub routes_status: Vec<ResultRouteStatus>,
    /// Every signal aspect transition, in publication order.
    pub signal_changes: Vec<ResultSignalChange>,
}

impl SimulationResult {
    /// Check every train reached exactly its scheduled stops.
    ///
    /// # Errors
    ///
    /// [`OutputError::StopCountMismatch`] for the first train that did
    /// not.
    pub fn validate(&self) -> Result<(), OutputError> {
        for (name, train) in &self.trains {
            if train.stop_reaches.len() != train.stop_count {
                return Err(OutputError::StopCountMismatch {
                    train: name.clone(),
                    expected: train.stop_count,
                    reached: train.stop_reaches.len(),
                });
            }
        }
        Ok(())
    }

    /// Thin every curve with [`rdp`]: positions over time, speeds over
    /// position.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidTolerance`] for a negative or non-finite
    /// tolerance; the result is untouched.
    pub fn simplify(&mut self, tolerance: SimplifyTolerance) -> Result<(), OutputError> {
        tolerance.validate()?;
        let position = |p: &ResultPosition, a: &ResultPosition, b: &ResultPosition| {
            chord_distance(p, a, b, |q| q.time, |q| q.path_offset)
        };
        let speed = |p: &ResultSpeed, a: &ResultSpeed, b: &ResultSpeed| {
            chord_distance(p, a, b, |q| q.position, |q| q.speed)
        };
        for train in self.trains.values_mut() {
            train.head_positions = rdp(&train.head_positions, tolerance.position, position);
            train.tail_positions = rdp(&train.tail_positions, tolerance.position, position);
            train.speeds = rdp(&train.speeds, tolerance.speed, speed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(stop_count: usize, reached: usize) -> ResultTrain {
        ResultTrain {
            stop_count,
            stop_reaches: (0..reached)
                .map(|i| ResultStopReach {
                    time: i as f64,
                    stop_index: i,
                    position: 100.0 * i as f64,
                })
                .collect(),
            ..ResultTrain::default()
        }
    }

    #[test]
    fn validate_reports_the_short_train() {
        let mut result = SimulationResult::default();
        result.trains.insert("ok".into(), train(2, 2));
        result.trains.insert("short".into(), train(3, 1));
        assert_eq!(
            result.validate(),
            Err(OutputError::StopCountMismatch {
                train: "short".into(),
                expected: 3,
                reached: 1,
            })
        );
    }

    #[test]
    fn simplify_collapses_constant_speed_runs() {
        let mut t = train(0, 0);
        t.head_positions = (0..=10)
            .map(|i| ResultPosition {
                time: i as f64,
                path_offset: 20.0 * i as f64,
            })
            .collect();
        t.speeds = (0..=10)
            .map(|i| ResultSpeed {
                time: i as f64,
                position: 20.0 * i as f64,
                speed: 20.0,
            })
            .collect();
        let mut result = SimulationResult::default();
        result.trains.insert("IC".into(), t);
        result.simplify(SimplifyTolerance::default()).unwrap();
        let t = &result.trains["IC"];
        assert_eq!(t.head_positions.len(), 2);
        assert_eq!(t.speeds.len(), 2);
    }

    #[test]
    fn bad_tolerance_leaves_result_untouched() {
        let mut result = SimulationResult::default();
        result.trains.insert("IC".into(), train(0, 0));
        let before = result.clone();
        let bad = SimplifyTolerance {
            position: f64::NAN,
            speed: 0.2,
        };
        assert!(result.simplify(bad).is_err());
        assert_eq!(result, before);
    }

    #[test]
    fn result_serializes_with_snake_case_keys() {
        let mut result = SimulationResult::default();
        result.trains.insert("IC".into(), train(1, 1));
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"routes_status\""));
        assert!(json.contains("\"stop_reaches\""));
        let back: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
