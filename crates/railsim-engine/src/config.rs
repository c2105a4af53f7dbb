//! Simulation configuration and its validation errors.

use std::error::Error;
use std::fmt;

use railsim_core::SimTime;
use railsim_physics::{PhysicsConfig, PhysicsError};
use serde::{Deserialize, Serialize};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimulationConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Physics configuration is invalid.
    Physics(PhysicsError),
    /// `start_time` is NaN, infinite, or negative.
    InvalidStartTime {
        /// The invalid value.
        value: f64,
    },
    /// `max_signal_cascade` is zero.
    SignalCascadeZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Physics(e) => write!(f, "physics: {e}"),
            Self::InvalidStartTime { value } => {
                write!(f, "start_time must be finite and non-negative, got {value}")
            }
            Self::SignalCascadeZero => write!(f, "max_signal_cascade must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Physics(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for ConfigError {
    fn from(e: PhysicsError) -> Self {
        Self::Physics(e)
    }
}

// ── SimulationConfig ───────────────────────────────────────────────

/// Parameters of one simulation run.
///
/// Constructed in code or deserialized by a front end; checked by
/// [`validate()`](Self::validate) before the run starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated time at which the run starts.
    pub start_time: SimTime,
    /// Integration and allowance parameters for every train.
    pub physics: PhysicsConfig,
    /// Upper bound on signal evaluations triggered by one route or
    /// section change.
    pub max_signal_cascade: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            physics: PhysicsConfig::default(),
            max_signal_cascade: 1024,
        }
    }
}

impl SimulationConfig {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// The first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(ConfigError::InvalidStartTime {
                value: self.start_time,
            });
        }
        if self.max_signal_cascade == 0 {
            return Err(ConfigError::SignalCascadeZero);
        }
        self.physics.validate()?;
        Ok(())
    }
}
