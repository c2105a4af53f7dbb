//! Explicit time-stepped integration of train dynamics.
//!
//! Every step holds the acceleration constant, so consecutive samples
//! satisfy `Δx = Δt · (v0 + v1) / 2` exactly. That is the same relation
//! [`EnvelopePart`](railsim_envelope::EnvelopePart) uses to derive its
//! times, so an integrated curve replays with the time it was built with.

use railsim_envelope::Action;

use crate::path::PhysicsPath;
use crate::rolling_stock::RollingStock;
use crate::GRAVITY;

/// Outcome of one integration step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationStep {
    /// Time elapsed, s.
    pub time_delta: f64,
    /// Distance covered, m. Negative when integrating backward.
    pub position_delta: f64,
    /// Speed at the end of the step, m/s.
    pub end_speed: f64,
    /// Acceleration held during the step, m/s².
    pub acceleration: f64,
}

/// Integrates a train's motion along a path.
pub struct TrainPhysicsIntegrator<'a, P: PhysicsPath + ?Sized> {
    stock: &'a RollingStock,
    path: &'a P,
    time_step: f64,
}

impl<'a, P: PhysicsPath + ?Sized> TrainPhysicsIntegrator<'a, P> {
    /// An integrator stepping `time_step` seconds at a time.
    pub fn new(stock: &'a RollingStock, path: &'a P, time_step: f64) -> Self {
        Self {
            stock,
            path,
            time_step,
        }
    }

    /// The rolling stock being integrated.
    pub fn stock(&self) -> &RollingStock {
        self.stock
    }

    /// Full traction, or coasting if the curve yields no force.
    pub fn max_traction(&self, speed: f64) -> Action {
        let force = self.stock.tractive_effort.force_at(speed);
        if force > 0.0 {
            Action::accelerate(force)
        } else {
            Action::COAST
        }
    }

    /// Service braking.
    pub fn service_brake(&self) -> Action {
        Action::brake(-self.stock.service_deceleration * self.stock.inertia())
    }

    /// Acceleration produced by `action` at `position` and `speed`.
    ///
    /// Braking is the constant service deceleration. Other actions add
    /// traction to the Davis resistance and the gradient force.
    pub fn acceleration(&self, position: f64, speed: f64, action: Action) -> f64 {
        let inertia = self.stock.inertia();
        if action.is_braking() {
            return action.braking_force() / inertia;
        }
        let resistance = self.stock.rolling_resistance.at(speed);
        let grade_force = self.stock.mass * GRAVITY * self.path.grade_at(position) / 1000.0;
        (action.traction_force() - resistance - grade_force) / inertia
    }

    /// Advance one step forward from `(position, speed)` under `action`.
    ///
    /// If the speed would drop below zero the step is shortened to the
    /// instant the train stops.
    pub fn step(&self, position: f64, speed: f64, action: Action) -> IntegrationStep {
        let acceleration = self.acceleration(position, speed, action);
        let mut time_delta = self.time_step;
        let mut end_speed = speed + acceleration * time_delta;
        if end_speed < 0.0 {
            time_delta = if acceleration < 0.0 { speed / -acceleration } else { 0.0 };
            end_speed = 0.0;
        }
        IntegrationStep {
            time_delta,
            position_delta: (speed + end_speed) / 2.0 * time_delta,
            end_speed,
            acceleration,
        }
    }

    /// Step backward in time from `(position, speed)` under service braking.
    ///
    /// Going back in time a braking train was faster and further
    /// upstream, so `end_speed > speed` and `position_delta < 0`.
    pub fn step_back_braking(&self, speed: f64) -> IntegrationStep {
        let deceleration = self.stock.service_deceleration;
        let end_speed = speed + deceleration * self.time_step;
        IntegrationStep {
            time_delta: self.time_step,
            position_delta: -(speed + end_speed) / 2.0 * self.time_step,
            end_speed,
            acceleration: -deceleration,
        }
    }
}
