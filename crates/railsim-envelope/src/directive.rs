//! Per-position driving directives.

/// The binding speed constraint at one position.
///
/// A plain directive allows up to `allowed_speed`. A braking directive
/// additionally requires the brakes to be applied to meet it. A coasting
/// directive forbids traction altogether.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedDirective {
    /// Highest permitted speed; infinite when unconstrained.
    pub allowed_speed: f64,
    /// Traction is cut.
    pub is_coasting: bool,
    /// Brakes must be applied to respect `allowed_speed`.
    pub is_braking: bool,
}

impl SpeedDirective {
    /// A directive allowing up to `allowed_speed`.
    pub fn new(allowed_speed: f64) -> Self {
        Self {
            allowed_speed,
            is_coasting: false,
            is_braking: false,
        }
    }

    /// The unconstrained directive.
    pub fn max() -> Self {
        Self::new(f64::INFINITY)
    }

    /// A directive requiring the train to coast.
    pub fn coasting() -> Self {
        Self {
            is_coasting: true,
            ..Self::max()
        }
    }

    /// A directive requiring braking down to `speed`.
    pub fn braking(speed: f64) -> Self {
        Self {
            is_braking: true,
            ..Self::new(speed)
        }
    }

    /// Combine with another directive applying at the same position.
    ///
    /// Coasting dominates. Otherwise a strictly lower speed replaces the
    /// current one and brings its braking flag; on equal speeds the
    /// current braking flag is kept.
    pub fn merge_with(&mut self, other: &SpeedDirective) {
        if other.is_coasting {
            self.is_coasting = true;
        } else if other.allowed_speed < self.allowed_speed {
            self.allowed_speed = other.allowed_speed;
            self.is_braking = other.is_braking;
        }
    }

    /// Merged copy of `self` and `other`.
    pub fn merged(mut self, other: &SpeedDirective) -> Self {
        self.merge_with(other);
        self
    }
}

impl Default for SpeedDirective {
    fn default() -> Self {
        Self::max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_speed_wins_with_its_braking_flag() {
        let mut d = SpeedDirective::new(30.0);
        d.merge_with(&SpeedDirective::braking(20.0));
        assert_eq!(d.allowed_speed, 20.0);
        assert!(d.is_braking);
    }

    #[test]
    fn higher_speed_is_ignored() {
        let mut d = SpeedDirective::braking(20.0);
        d.merge_with(&SpeedDirective::new(30.0));
        assert_eq!(d.allowed_speed, 20.0);
        assert!(d.is_braking);
    }

    #[test]
    fn equal_speed_keeps_incumbent_flag() {
        let mut d = SpeedDirective::new(20.0);
        d.merge_with(&SpeedDirective::braking(20.0));
        assert!(!d.is_braking);
    }

    #[test]
    fn coasting_dominates() {
        let mut d = SpeedDirective::braking(10.0);
        d.merge_with(&SpeedDirective::coasting());
        assert!(d.is_coasting);
        assert_eq!(d.allowed_speed, 10.0);

        let d = SpeedDirective::coasting().merged(&SpeedDirective::new(5.0));
        assert!(d.is_coasting);
    }

    #[test]
    fn default_is_unconstrained() {
        let d = SpeedDirective::default();
        assert!(d.allowed_speed.is_infinite());
        assert!(!d.is_coasting && !d.is_braking);
    }
}
