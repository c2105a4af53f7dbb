//! Physics engine errors.

use railsim_envelope::EnvelopeError;
use thiserror::Error;

/// Why an envelope could not be computed.
///
/// Every variant describes inputs that cannot be realized by the train,
/// not a transient condition.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PhysicsError {
    /// An envelope contract was violated while composing curves.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The unconstrained running time is zero, so a time-based allowance
    /// cannot be converted to a percentage.
    #[error("total running time is zero")]
    ZeroRunningTime,
    /// Traction cannot overcome resistance and the train stalls.
    #[error("train stalls at position {position}")]
    TrainCannotStart {
        /// Where the speed reached zero.
        position: f64,
    },
    /// A braking curve did not converge.
    #[error("cannot brake to {target_speed} before position {position}")]
    CannotBrake {
        /// Target position of the braking curve.
        position: f64,
        /// Target speed of the braking curve.
        target_speed: f64,
    },
    /// The initial speed is above what braking constraints allow.
    #[error("initial speed {speed} exceeds the allowed {allowed}")]
    InitialSpeedTooHigh {
        /// Requested initial speed.
        speed: f64,
        /// Highest realizable speed at the start position.
        allowed: f64,
    },
    /// An allowance value is unusable.
    #[error("invalid allowance {value}: {reason}")]
    InvalidAllowance {
        /// The allowance value.
        value: f64,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A stop lies outside the planned range.
    #[error("stop at {position} is outside [{begin}, {end}]")]
    StopOutOfPath {
        /// Stop position.
        position: f64,
        /// First position of the planned range.
        begin: f64,
        /// Last position of the planned range.
        end: f64,
    },
    /// A curve needed more integration steps than allowed.
    #[error("integration exceeded {steps} steps")]
    IntegrationLimit {
        /// The configured step budget.
        steps: usize,
    },
    /// A physics configuration field is out of range.
    #[error("invalid physics configuration: {field} = {value}")]
    InvalidConfig {
        /// Name of the field.
        field: &'static str,
        /// Its value.
        value: f64,
    },
    /// A path description is malformed.
    #[error("invalid path: {reason}")]
    InvalidPath {
        /// What is wrong with it.
        reason: String,
    },
}
