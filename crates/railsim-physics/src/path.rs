//! The physical path a train runs along.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Longitudinal geometry seen by the physics integrator.
///
/// Positions run from `0` to [`length`](PhysicsPath::length).
pub trait PhysicsPath {
    /// Total path length, m.
    fn length(&self) -> f64;

    /// Gradient at `position`, in ‰. Positive is uphill.
    fn grade_at(&self, position: f64) -> f64;
}

// ── FlatPath ────────────────────────────────────────────────────

/// A path with one constant gradient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatPath {
    length: f64,
    grade: f64,
}

impl FlatPath {
    /// A path of `length` metres with a constant `grade` in ‰.
    pub fn new(length: f64, grade: f64) -> Self {
        Self { length, grade }
    }
}

impl PhysicsPath for FlatPath {
    fn length(&self) -> f64 {
        self.length
    }

    fn grade_at(&self, _position: f64) -> f64 {
        self.grade
    }
}

// ── GradedPath ──────────────────────────────────────────────────

/// A range of constant gradient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeSection {
    /// First position.
    pub begin: f64,
    /// Last position.
    pub end: f64,
    /// Gradient, ‰.
    pub grade: f64,
}

/// A path made of non-overlapping gradient sections.
///
/// Positions not covered by a section are level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradedPath {
    length: f64,
    sections: Vec<GradeSection>,
}

impl GradedPath {
    /// Build a path from sections sorted by position.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidPath`] if the length is not positive, a
    /// section is empty, leaves the path, overlaps the previous one, or
    /// has a non-finite grade.
    pub fn new(length: f64, sections: Vec<GradeSection>) -> Result<Self, PhysicsError> {
        if !length.is_finite() || length <= 0.0 {
            return Err(PhysicsError::InvalidPath {
                reason: format!("length {length} must be positive"),
            });
        }
        let mut previous_end = 0.0;
        for (i, s) in sections.iter().enumerate() {
            let finite = s.begin.is_finite() && s.end.is_finite();
            if !finite || s.end <= s.begin || s.begin < previous_end || s.end > length {
                return Err(PhysicsError::InvalidPath {
                    reason: format!("grade section {i} [{}, {}] is misplaced", s.begin, s.end),
                });
            }
            if !s.grade.is_finite() {
                return Err(PhysicsError::InvalidPath {
                    reason: format!("grade section {i} has grade {}", s.grade),
                });
            }
            previous_end = s.end;
        }
        Ok(Self { length, sections })
    }

    /// The gradient sections.
    pub fn sections(&self) -> &[GradeSection] {
        &self.sections
    }
}

impl PhysicsPath for GradedPath {
    fn length(&self) -> f64 {
        self.length
    }

    fn grade_at(&self, position: f64) -> f64 {
        let index = self.sections.partition_point(|s| s.end < position);
        match self.sections.get(index) {
            Some(s) if s.begin <= position => s.grade,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> GradedPath {
        GradedPath::new(
            1000.0,
            vec![
                GradeSection {
                    begin: 100.0,
                    end: 200.0,
                    grade: 5.0,
                },
                GradeSection {
                    begin: 200.0,
                    end: 400.0,
                    grade: -3.0,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn flat_path_is_constant() {
        let p = FlatPath::new(10_000.0, 0.0);
        assert_eq!(p.length(), 10_000.0);
        assert_eq!(p.grade_at(5_000.0), 0.0);
    }

    #[test]
    fn graded_path_lookup() {
        let p = path();
        assert_eq!(p.grade_at(50.0), 0.0);
        assert_eq!(p.grade_at(150.0), 5.0);
        assert_eq!(p.grade_at(200.0), 5.0);
        assert_eq!(p.grade_at(300.0), -3.0);
        assert_eq!(p.grade_at(900.0), 0.0);
    }

    #[test]
    fn overlapping_sections_rejected() {
        let err = GradedPath::new(
            1000.0,
            vec![
                GradeSection {
                    begin: 100.0,
                    end: 300.0,
                    grade: 1.0,
                },
                GradeSection {
                    begin: 200.0,
                    end: 400.0,
                    grade: 1.0,
                },
            ],
        );
        assert!(matches!(err, Err(PhysicsError::InvalidPath { .. })));
    }

    #[test]
    fn section_past_end_rejected() {
        let err = GradedPath::new(
            100.0,
            vec![GradeSection {
                begin: 50.0,
                end: 150.0,
                grade: 1.0,
            }],
        );
        assert!(err.is_err());
    }
}
