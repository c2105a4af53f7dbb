//! The staged envelope pipeline.

use railsim_envelope::Envelope;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allowance::{apply_allowances, Allowance};
use crate::config::PhysicsConfig;
use crate::error::PhysicsError;
use crate::integration::TrainPhysicsIntegrator;
use crate::max_effort::compute_max_effort;
use crate::max_speed::compute_max_speed;
use crate::mrsp::{compute_mrsp, SpeedLimit};
use crate::path::PhysicsPath;
use crate::rolling_stock::RollingStock;

// ── EnvelopeRequest ─────────────────────────────────────────────

/// What a train must do over one range of its path.
///
/// The train starts at `begin` with `initial_speed`, halts at every
/// entry of `stops`, and halts at `end`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeRequest {
    /// Start position.
    pub begin: f64,
    /// Position where the train must be stopped.
    pub end: f64,
    /// Speed at `begin`.
    pub initial_speed: f64,
    /// Track speed limits.
    pub speed_limits: Vec<SpeedLimit>,
    /// Intermediate stop positions.
    pub stops: Vec<f64>,
    /// Margins applied after the max-effort stage.
    pub allowances: Vec<Allowance>,
}

impl EnvelopeRequest {
    /// A standing start from `0` to `length` with no constraint.
    pub fn full_path(length: f64) -> Self {
        Self {
            begin: 0.0,
            end: length,
            initial_speed: 0.0,
            speed_limits: Vec::new(),
            stops: Vec::new(),
            allowances: Vec::new(),
        }
    }

    /// Set the track speed limits.
    pub fn with_speed_limits(mut self, limits: Vec<SpeedLimit>) -> Self {
        self.speed_limits = limits;
        self
    }

    /// Set the speed at `begin`.
    pub fn with_initial_speed(mut self, speed: f64) -> Self {
        self.initial_speed = speed;
        self
    }

    /// Set the intermediate stops.
    pub fn with_stops(mut self, stops: Vec<f64>) -> Self {
        self.stops = stops;
        self
    }

    /// Set the allowances.
    pub fn with_allowances(mut self, allowances: Vec<Allowance>) -> Self {
        self.allowances = allowances;
        self
    }
}

// ── TrainEnvelopes ──────────────────────────────────────────────

/// Every stage of one pipeline run.
#[derive(Clone, Debug)]
pub struct TrainEnvelopes {
    /// Static speed ceiling.
    pub mrsp: Envelope,
    /// Ceiling with braking curves.
    pub max_speed: Envelope,
    /// Full-power envelope.
    pub max_effort: Envelope,
    /// Combined allowance speed factor, `1.0` without allowances.
    pub allowance_factor: f64,
    /// The envelope the train follows.
    pub scheduled: Envelope,
}

// ── EnvelopePipeline ────────────────────────────────────────────

/// Largest excess of a replanned initial speed over the braking ceiling
/// accepted as sampling noise, m/s.
///
/// A train synced mid-segment moves at constant acceleration in time, so
/// its speed can sit slightly above the position-linear ceiling.
pub const REPLAN_SPEED_TOLERANCE: f64 = 0.1;

/// Derives envelopes for one rolling stock on one path.
///
/// # Example
///
/// ```
/// use railsim_physics::{
///     EnvelopePipeline, EnvelopeRequest, FlatPath, PhysicsConfig, RollingResistance,
///     RollingStock, TractiveEffortCurve, TractivePoint,
/// };
///
/// let stock = RollingStock {
///     id: "demo".into(),
///     length: 200.0,
///     mass: 400_000.0,
///     inertia_coefficient: 1.05,
///     max_speed: 44.4,
///     rolling_resistance: RollingResistance { a: 4_000.0, b: 40.0, c: 8.0 },
///     tractive_effort: TractiveEffortCurve::new([
///         TractivePoint { speed: 0.0, force: 300_000.0 },
///         TractivePoint { speed: 50.0, force: 120_000.0 },
///     ]),
///     service_deceleration: 0.5,
/// };
/// let path = FlatPath::new(10_000.0, 0.0);
/// let config = PhysicsConfig::default();
/// let pipeline = EnvelopePipeline::new(&stock, &path, &config).unwrap();
/// let envelopes = pipeline
///     .compute(&EnvelopeRequest::full_path(10_000.0).with_stops(vec![8_500.0]))
///     .unwrap();
/// assert_eq!(envelopes.scheduled.interpolate_speed(8_500.0), 0.0);
/// ```
pub struct EnvelopePipeline<'a, P: PhysicsPath + ?Sized> {
    integrator: TrainPhysicsIntegrator<'a, P>,
    path: &'a P,
    config: &'a PhysicsConfig,
}

impl<'a, P: PhysicsPath + ?Sized> EnvelopePipeline<'a, P> {
    /// A pipeline for `stock` running on `path`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        stock: &'a RollingStock,
        path: &'a P,
        config: &'a PhysicsConfig,
    ) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self {
            integrator: TrainPhysicsIntegrator::new(stock, path, config.time_step),
            path,
            config,
        })
    }

    /// Stage 1: static speed ceiling over `[begin, end]`.
    ///
    /// # Errors
    ///
    /// See [`compute_mrsp`].
    pub fn mrsp(&self, limits: &[SpeedLimit], begin: f64, end: f64) -> Result<Envelope, PhysicsError> {
        compute_mrsp(self.integrator.stock(), limits, begin, end)
    }

    /// Stage 2: braking curves into speed drops, `stops`, and the end.
    ///
    /// # Errors
    ///
    /// See [`compute_max_speed`].
    pub fn max_speed(&self, mrsp: &Envelope, stops: &[f64]) -> Result<Envelope, PhysicsError> {
        compute_max_speed(&self.integrator, mrsp, stops, self.config.max_integration_steps)
    }

    /// Stage 3: full-power acceleration curves.
    ///
    /// # Errors
    ///
    /// See [`compute_max_effort`].
    pub fn max_effort(&self, max_speed: &Envelope, initial_speed: f64) -> Result<Envelope, PhysicsError> {
        compute_max_effort(
            &self.integrator,
            max_speed,
            initial_speed,
            self.config.max_integration_steps,
        )
    }

    /// Run every stage, including the allowances of `request`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::StopOutOfPath`] if the range leaves the path, or
    /// any stage error.
    pub fn compute(&self, request: &EnvelopeRequest) -> Result<TrainEnvelopes, PhysicsError> {
        let (mrsp, max_speed) = self.ceilings(request)?;
        let max_effort = self.max_effort(&max_speed, request.initial_speed)?;
        let (scheduled, allowance_factor) = apply_allowances(
            &max_effort,
            &request.allowances,
            self.config.allowance_sample_step,
        )?;
        debug!(
            begin = request.begin,
            end = request.end,
            stops = request.stops.len(),
            allowance_factor,
            running_time = scheduled.total_time(),
            "envelope computed"
        );
        Ok(TrainEnvelopes {
            mrsp,
            max_speed,
            max_effort,
            allowance_factor,
            scheduled,
        })
    }

    /// Run every stage with a known speed `factor` instead of allowances.
    ///
    /// Used to replan part of a path that already runs under allowances:
    /// the physics is computed for `initial_speed / factor`, then scaled
    /// back by `factor`, so the new envelope joins the train's current
    /// speed and keeps the margin. An excess over the ceiling of at most
    /// [`REPLAN_SPEED_TOLERANCE`] is sampling noise and is capped.
    /// `request.allowances` is ignored.
    ///
    /// # Errors
    ///
    /// As [`compute`](Self::compute), plus
    /// [`PhysicsError::InvalidAllowance`] for a factor outside `(0, 1]` and
    /// [`PhysicsError::InitialSpeedTooHigh`] when the train cannot brake
    /// from `initial_speed` before `request.end` or a stop.
    pub fn compute_with_factor(
        &self,
        request: &EnvelopeRequest,
        factor: f64,
    ) -> Result<TrainEnvelopes, PhysicsError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(PhysicsError::InvalidAllowance {
                value: factor,
                reason: "speed factor must lie in (0, 1]",
            });
        }
        let (mrsp, max_speed) = self.ceilings(request)?;
        let allowed = max_speed.try_interpolate_speed(request.begin)?;
        let unscaled_speed = request.initial_speed / factor;
        if unscaled_speed > allowed + REPLAN_SPEED_TOLERANCE {
            return Err(PhysicsError::InitialSpeedTooHigh {
                speed: unscaled_speed,
                allowed,
            });
        }
        let unscaled_speed = unscaled_speed.min(allowed);
        let max_effort = self.max_effort(&max_speed, unscaled_speed)?;
        let scheduled = if factor == 1.0 {
            max_effort.clone()
        } else {
            max_effort.scaled(factor)
        };
        debug!(
            begin = request.begin,
            end = request.end,
            initial_speed = request.initial_speed,
            factor,
            "envelope replanned"
        );
        Ok(TrainEnvelopes {
            mrsp,
            max_speed,
            max_effort,
            allowance_factor: factor,
            scheduled,
        })
    }

    fn ceilings(&self, request: &EnvelopeRequest) -> Result<(Envelope, Envelope), PhysicsError> {
        let length = self.path.length();
        for position in [request.begin, request.end] {
            if !(0.0..=length).contains(&position) {
                return Err(PhysicsError::StopOutOfPath {
                    position,
                    begin: 0.0,
                    end: length,
                });
            }
        }
        let mrsp = self.mrsp(&request.speed_limits, request.begin, request.end)?;
        let max_speed = self.max_speed(&mrsp, &request.stops)?;
        Ok((mrsp, max_speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FlatPath;
    use crate::rolling_stock::{RollingResistance, TractiveEffortCurve, TractivePoint};
    use tracing_test::traced_test;

    fn stock() -> RollingStock {
        RollingStock {
            id: "unit".into(),
            length: 100.0,
            mass: 100_000.0,
            inertia_coefficient: 1.0,
            max_speed: 30.0,
            rolling_resistance: RollingResistance {
                a: 0.0,
                b: 0.0,
                c: 0.0,
            },
            tractive_effort: TractiveEffortCurve::new([TractivePoint {
                speed: 0.0,
                force: 50_000.0,
            }]),
            service_deceleration: 0.5,
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let s = stock();
        let path = FlatPath::new(1_000.0, 0.0);
        let config = PhysicsConfig {
            time_step: 0.0,
            ..PhysicsConfig::default()
        };
        assert!(EnvelopePipeline::new(&s, &path, &config).is_err());
    }

    #[test]
    fn range_outside_path_fails() {
        let s = stock();
        let path = FlatPath::new(1_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        assert!(matches!(
            pipeline.compute(&EnvelopeRequest::full_path(2_000.0)),
            Err(PhysicsError::StopOutOfPath { .. })
        ));
    }

    #[traced_test]
    #[test]
    fn allowance_slows_scheduled_envelope() {
        let s = stock();
        let path = FlatPath::new(5_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        let request = EnvelopeRequest::full_path(5_000.0).with_allowances(vec![Allowance::percentage(20.0)]);
        let envelopes = pipeline.compute(&request).unwrap();
        let base = envelopes.max_effort.total_time();
        assert!((envelopes.scheduled.total_time() - base * 1.2).abs() < 1e-6);
        assert!((envelopes.allowance_factor - 1.0 / 1.2).abs() < 1e-12);
        assert!(logs_contain("envelope computed"));
    }

    #[test]
    fn replan_joins_current_speed() {
        let s = stock();
        let path = FlatPath::new(5_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        let factor = 0.8;
        let request = EnvelopeRequest {
            begin: 1_000.0,
            initial_speed: 16.0,
            ..EnvelopeRequest::full_path(5_000.0)
        };
        let envelopes = pipeline.compute_with_factor(&request, factor).unwrap();
        assert_eq!(envelopes.scheduled.begin(), 1_000.0);
        assert!((envelopes.scheduled.begin_speed() - 16.0).abs() < 1e-9);
        assert!((envelopes.max_effort.begin_speed() - 20.0).abs() < 1e-9);
        assert!(envelopes.scheduled.max_speed() <= 30.0 * factor + 1e-9);
    }

    #[test]
    fn replan_rejects_bad_factor() {
        let s = stock();
        let path = FlatPath::new(5_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        let request = EnvelopeRequest::full_path(5_000.0);
        assert!(pipeline.compute_with_factor(&request, 0.0).is_err());
        assert!(pipeline.compute_with_factor(&request, 1.5).is_err());
    }

    #[test]
    fn replan_rejects_speed_it_cannot_brake_from() {
        let s = stock();
        let path = FlatPath::new(5_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        // 100 m at 0.5 m/s² allows about 10 m/s
        let request = EnvelopeRequest {
            begin: 4_900.0,
            initial_speed: 25.0,
            ..EnvelopeRequest::full_path(5_000.0)
        };
        match pipeline.compute_with_factor(&request, 1.0) {
            Err(PhysicsError::InitialSpeedTooHigh { speed, allowed }) => {
                assert_eq!(speed, 25.0);
                assert!(allowed < 11.0);
            }
            other => panic!("expected InitialSpeedTooHigh, got {other:?}"),
        }
        // under a margin the check applies to the unscaled speed
        let request = EnvelopeRequest {
            initial_speed: 9.0,
            ..request
        };
        assert!(matches!(
            pipeline.compute_with_factor(&request, 0.5),
            Err(PhysicsError::InitialSpeedTooHigh { .. })
        ));
    }

    #[test]
    fn replan_caps_rounding_above_the_ceiling() {
        let s = stock();
        let path = FlatPath::new(5_000.0, 0.0);
        let config = PhysicsConfig::default();
        let pipeline = EnvelopePipeline::new(&s, &path, &config).unwrap();
        let mut request = EnvelopeRequest {
            begin: 4_900.0,
            ..EnvelopeRequest::full_path(5_000.0)
        };
        let ceiling = pipeline.compute_with_factor(&request, 1.0).unwrap();
        let allowed = ceiling.max_speed.try_interpolate_speed(4_900.0).unwrap();
        request.initial_speed = allowed + REPLAN_SPEED_TOLERANCE / 2.0;
        let envelopes = pipeline.compute_with_factor(&request, 1.0).unwrap();
        assert!((envelopes.scheduled.begin_speed() - allowed).abs() < 1e-9);
    }
}
