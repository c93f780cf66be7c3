use super::interpolator::CalibrationPoint;

/// Natural cubic spline through calibration points.
///
/// Knots must be strictly increasing by raw value and there must be at
/// least two of them; `CalibrationTable` guarantees both.
#[derive(Debug, Clone)]
pub struct CubicSpline<'a> {
    knots: &'a [CalibrationPoint],
    /// Second derivative of the curve at each knot, zero at both ends.
    curvature: Vec<f64>,
}

impl<'a> CubicSpline<'a> {
    pub fn new(knots: &'a [CalibrationPoint]) -> Self {
        debug_assert!(knots.len() >= 2);
        debug_assert!(knots.windows(2).all(|w| w[1].raw > w[0].raw));

        let n = knots.len();
        let slope = |i: usize| {
            (knots[i + 1].calibrated - knots[i].calibrated) / (knots[i + 1].raw - knots[i].raw)
        };

        // forward elimination of the tridiagonal system, then back substitution
        let mut curvature = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 1..n - 1 {
            let span = knots[i + 1].raw - knots[i - 1].raw;
            let sig = (knots[i].raw - knots[i - 1].raw) / span;
            let pivot = sig * curvature[i - 1] + 2.0;

            curvature[i] = (sig - 1.0) / pivot;
            rhs[i] = (6.0 * (slope(i) - slope(i - 1)) / span - sig * rhs[i - 1]) / pivot;
        }

        for i in (1..n - 1).rev() {
            curvature[i] = curvature[i] * curvature[i + 1] + rhs[i];
        }

        Self { knots, curvature }
    }

    /// Outside the knots the boundary polynomial is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let upper = self.knots.partition_point(|p| p.raw <= x);
        let lo = upper.clamp(1, self.knots.len() - 1) - 1;
        let (p1, p2) = (self.knots[lo], self.knots[lo + 1]);

        let h = p2.raw - p1.raw;
        let a = (p2.raw - x) / h;
        let b = (x - p1.raw) / h;

        a * p1.calibrated
            + b * p2.calibrated
            + (bend(a, self.curvature[lo]) + bend(b, self.curvature[lo + 1])) * h * h / 6.0
    }
}

/// `(t³ - t) * curvature`, zero on a straight end even when `t³` overflows.
fn bend(t: f64, curvature: f64) -> f64 {
    if curvature == 0.0 {
        0.0
    } else {
        (t * t * t - t) * curvature
    }
}
