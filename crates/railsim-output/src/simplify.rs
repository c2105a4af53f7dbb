//! Tolerance-based polyline reduction.

use serde::{Deserialize, Serialize};

use crate::error::OutputError;

/// Ramer–Douglas–Peucker simplification.
///
/// Keeps the first and last point, and recursively every point whose
/// `distance(point, start, end)` to the chord of its span exceeds
/// `epsilon`. Inputs with fewer than three points are returned as is.
///
/// ```
/// use railsim_output::rdp;
///
/// let line: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
/// let kept = rdp(&line, 0.1, |p, a, b| {
///     let t = (p.0 - a.0) / (b.0 - a.0);
///     (p.1 - (a.1 + t * (b.1 - a.1))).abs()
/// });
/// assert_eq!(kept, vec![(0.0, 0.0), (3.0, 3.0)]);
/// ```
pub fn rdp<T: Clone>(points: &[T], epsilon: f64, distance: impl Fn(&T, &T, &T) -> f64) -> Vec<T> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    let mut spans = vec![(0, points.len() - 1)];
    while let Some((start, end)) = spans.pop() {
        if end - start < 2 {
            continue;
        }
        let (a, b) = (&points[start], &points[end]);
        let mut worst = (start, 0.0);
        for (i, p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = distance(p, a, b);
            if d > worst.1 {
                worst = (i, d);
            }
        }
        if worst.1 > epsilon {
            keep[worst.0] = true;
            spans.push((start, worst.0));
            spans.push((worst.0, end));
        }
    }
    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then(|| p.clone()))
        .collect()
}

/// Vertical distance of `y(p)` to the chord from `a` to `b` over `x`.
///
/// Falls back to `|y(p) - y(a)|` when the chord is vertical.
pub(crate) fn chord_distance<T>(
    p: &T,
    a: &T,
    b: &T,
    x: impl Fn(&T) -> f64,
    y: impl Fn(&T) -> f64,
) -> f64 {
    let dx = x(b) - x(a);
    if dx.abs() < 1e-6 {
        return (y(p) - y(a)).abs();
    }
    let projected = y(a) + (x(p) - x(a)) * (y(b) - y(a)) / dx;
    (y(p) - projected).abs()
}

/// Tolerances for [`SimulationResult::simplify`](crate::SimulationResult::simplify).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyTolerance {
    /// Largest position error allowed on (time, position) curves.
    /// Default: 5.0 distance units.
    pub position: f64,
    /// Largest speed error allowed on (position, speed) curves.
    /// Default: 0.2 speed units.
    pub speed: f64,
}

impl Default for SimplifyTolerance {
    fn default() -> Self {
        Self {
            position: 5.0,
            speed: 0.2,
        }
    }
}

impl SimplifyTolerance {
    /// Check both tolerances are finite and non-negative.
    ///
    /// # Errors
    ///
    /// [`OutputError::InvalidTolerance`] naming the first bad field.
    pub fn validate(&self) -> Result<(), OutputError> {
        for (field, value) in [("position", self.position), ("speed", self.speed)] {
            if !value.is_finite() || value < 0.0 {
                return Err(OutputError::InvalidTolerance { field, value });
            }
        }
        Ok(())
    }
}
