//! Rolling stock characteristics.

use railsim_core::LoadError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ── RollingResistance ───────────────────────────────────────────

/// Davis rolling resistance `a + b·v + c·v²`, in newtons.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollingResistance {
    /// Constant term, N.
    pub a: f64,
    /// Linear term, N per m/s.
    pub b: f64,
    /// Quadratic term, N per (m/s)².
    pub c: f64,
}

impl RollingResistance {
    /// Resistance force at `speed`.
    pub fn at(&self, speed: f64) -> f64 {
        self.a + self.b * speed + self.c * speed * speed
    }
}

// ── TractiveEffortCurve ─────────────────────────────────────────

/// One sample of a tractive effort curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TractivePoint {
    /// Speed, m/s.
    pub speed: f64,
    /// Maximum traction force at that speed, N.
    pub force: f64,
}

/// Maximum traction force as a piecewise-linear function of speed.
///
/// Below the first sample the first force applies; above the last
/// sample the last force applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TractiveEffortCurve {
    points: SmallVec<[TractivePoint; 8]>,
}

impl TractiveEffortCurve {
    /// Build a curve from samples sorted by increasing speed.
    pub fn new(points: impl IntoIterator<Item = TractivePoint>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    /// The samples.
    pub fn points(&self) -> &[TractivePoint] {
        &self.points
    }

    /// Maximum traction force at `speed`.
    pub fn force_at(&self, speed: f64) -> f64 {
        let points = &self.points;
        let Some(first) = points.first() else {
            return 0.0;
        };
        if speed <= first.speed {
            return first.force;
        }
        let upper = points.partition_point(|p| p.speed < speed);
        if upper >= points.len() {
            return points[points.len() - 1].force;
        }
        let (lo, hi) = (points[upper - 1], points[upper]);
        lo.force + (hi.force - lo.force) * (speed - lo.speed) / (hi.speed - lo.speed)
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.points.is_empty() {
            return Err("tractive effort curve is empty");
        }
        for (i, p) in self.points.iter().enumerate() {
            if !p.speed.is_finite() || p.speed < 0.0 {
                return Err("tractive effort speeds must be finite and non-negative");
            }
            if !p.force.is_finite() || p.force <= 0.0 {
                return Err("tractive effort forces must be positive");
            }
            if i > 0 && p.speed <= self.points[i - 1].speed {
                return Err("tractive effort speeds must be strictly increasing");
            }
        }
        Ok(())
    }
}

// ── RollingStock ────────────────────────────────────────────────

/// Physical characteristics of a train, in SI units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollingStock {
    /// Identifier referenced by schedules.
    pub id: String,
    /// Train length, m.
    pub length: f64,
    /// Train mass, kg.
    pub mass: f64,
    /// Rotating mass factor applied to inertia, at least 1.
    pub inertia_coefficient: f64,
    /// Rated maximum speed, m/s.
    pub max_speed: f64,
    /// Davis resistance.
    pub rolling_resistance: RollingResistance,
    /// Traction capability.
    pub tractive_effort: TractiveEffortCurve,
    /// Constant service braking deceleration, m/s², positive.
    pub service_deceleration: f64,
}

impl RollingStock {
    /// Mass including the rotating mass factor.
    pub fn inertia(&self) -> f64 {
        self.mass * self.inertia_coefficient
    }

    /// Check that every characteristic is physically meaningful.
    ///
    /// # Errors
    ///
    /// [`LoadError::InvalidRollingStock`] naming this stock and the
    /// first problem found.
    pub fn validate(&self) -> Result<(), LoadError> {
        let invalid = |reason: &str| LoadError::InvalidRollingStock {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.length) {
            return Err(invalid("length must be positive"));
        }
        if !positive(self.mass) {
            return Err(invalid("mass must be positive"));
        }
        if !self.inertia_coefficient.is_finite() || self.inertia_coefficient < 1.0 {
            return Err(invalid("inertia coefficient must be at least 1"));
        }
        if !positive(self.max_speed) {
            return Err(invalid("max speed must be positive"));
        }
        if !positive(self.service_deceleration) {
            return Err(invalid("service deceleration must be positive"));
        }
        let r = self.rolling_resistance;
        if [r.a, r.b, r.c].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid("rolling resistance terms must be non-negative"));
        }
        self.tractive_effort.validate().map_err(invalid)
    }
}
