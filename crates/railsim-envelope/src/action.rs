//! The driver's instantaneous control decision.

/// The kind of control a driver applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Apply traction.
    Accelerate,
    /// Apply the brakes.
    Brake,
    /// Apply whatever force keeps the speed constant.
    Maintain,
    /// No force at all.
    Coast,
}

/// What the driver does during one integration step.
///
/// Forces are in newtons. Traction is positive and braking negative.
/// The only way to build an action is through the checked
/// constructors, so the force is always finite and has the sign its
/// kind requires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Action {
    kind: ActionKind,
    force: f64,
}

impl Action {
    /// The shared coasting action.
    pub const COAST: Action = Action {
        kind: ActionKind::Coast,
        force: 0.0,
    };

    /// Traction with a positive `force`.
    ///
    /// # Panics
    ///
    /// Panics unless `force` is finite and strictly positive.
    pub fn accelerate(force: f64) -> Self {
        assert!(
            force.is_finite() && force > 0.0,
            "traction force must be positive, got {force}"
        );
        Self {
            kind: ActionKind::Accelerate,
            force,
        }
    }

    /// Braking with a negative `force`.
    ///
    /// # Panics
    ///
    /// Panics unless `force` is finite and strictly negative.
    pub fn brake(force: f64) -> Self {
        assert!(
            force.is_finite() && force < 0.0,
            "braking force must be negative, got {force}"
        );
        Self {
            kind: ActionKind::Brake,
            force,
        }
    }

    /// Hold speed with `force`.
    ///
    /// # Panics
    ///
    /// Panics if `force` is not finite.
    pub fn maintain(force: f64) -> Self {
        assert!(force.is_finite(), "maintain force must be finite, got {force}");
        Self {
            kind: ActionKind::Maintain,
            force,
        }
    }

    /// What kind of control this is.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Whether this is a braking action.
    pub fn is_braking(&self) -> bool {
        self.kind == ActionKind::Brake
    }

    /// The applied force; `0.0` when coasting.
    pub fn force(&self) -> f64 {
        self.force
    }

    /// Braking force, or `0.0` unless braking.
    pub fn braking_force(&self) -> f64 {
        match self.kind {
            ActionKind::Brake => self.force,
            _ => 0.0,
        }
    }

    /// Traction force, or `0.0` unless accelerating or maintaining.
    pub fn traction_force(&self) -> f64 {
        match self.kind {
            ActionKind::Accelerate | ActionKind::Maintain => self.force,
            _ => 0.0,
        }
    }
}
