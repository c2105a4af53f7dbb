//! Physics configuration.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Numeric parameters of the envelope pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Integration time step, in seconds. Default: 0.2.
    pub time_step: f64,
    /// Most steps a single curve may take. Default: 1 000 000.
    pub max_integration_steps: usize,
    /// Spacing of the position samples used to measure running time
    /// for allowances. Default: 1.0.
    pub allowance_sample_step: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            time_step: 0.2,
            max_integration_steps: 1_000_000,
            allowance_sample_step: 1.0,
        }
    }
}

impl PhysicsConfig {
    /// Check every field is usable.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(PhysicsError::InvalidConfig {
                field: "time_step",
                value: self.time_step,
            });
        }
        if self.max_integration_steps == 0 {
            return Err(PhysicsError::InvalidConfig {
                field: "max_integration_steps",
                value: 0.0,
            });
        }
        if !self.allowance_sample_step.is_finite() || self.allowance_sample_step <= 0.0 {
            return Err(PhysicsError::InvalidConfig {
                field: "allowance_sample_step",
                value: self.allowance_sample_step,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_time_step() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let cfg = PhysicsConfig {
                time_step: bad,
                ..PhysicsConfig::default()
            };
            match cfg.validate() {
                Err(PhysicsError::InvalidConfig { field, .. }) => assert_eq!(field, "time_step"),
                other => panic!("expected InvalidConfig, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_zero_step_budget() {
        let cfg = PhysicsConfig {
            max_integration_steps: 0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PhysicsError::InvalidConfig {
                field: "max_integration_steps",
                ..
            })
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: PhysicsConfig = serde_json::from_str(r#"{"time_step": 0.5}"#).unwrap();
        assert_eq!(cfg.time_step, 0.5);
        assert_eq!(cfg.max_integration_steps, 1_000_000);
    }
}
