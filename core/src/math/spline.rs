use crate::prelude::{ProcessingError, ProcessingResult};

/// Piecewise cubic through strictly increasing knots, with not-a-knot end conditions.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    /// Per-interval `[c3, c2, c1, c0]` in powers of `(x - knot)`.
    coefficients: Vec<[f64; 4]>,
}

impl CubicSpline {
    pub fn not_a_knot(x: &[f64], y: &[f64]) -> ProcessingResult<Self> {
        if x.len() != y.len() {
            return Err(ProcessingError::ShapeMismatch(format!(
                "spline knots ({}) and values ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();
        if n < 4 {
            return Err(ProcessingError::InvalidParameter(format!(
                "not-a-knot spline needs at least 4 knots, got {}",
                n
            )));
        }
        if x.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(ProcessingError::InvalidParameter(
                "spline knots must be strictly increasing".into(),
            ));
        }

        let dx: Vec<f64> = x.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let slope: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / dx[i]).collect();

        let mut lower = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        for i in 1..n - 1 {
            lower[i] = dx[i];
            diag[i] = 2.0 * (dx[i - 1] + dx[i]);
            upper[i] = dx[i - 1];
            rhs[i] = 3.0 * (dx[i] * slope[i - 1] + dx[i - 1] * slope[i]);
        }

        let head = x[2] - x[0];
        diag[0] = dx[1];
        upper[0] = head;
        rhs[0] = ((dx[0] + 2.0 * head) * dx[1] * slope[0] + dx[0] * dx[0] * slope[1]) / head;

        let tail = x[n - 1] - x[n - 3];
        diag[n - 1] = dx[n - 3];
        lower[n - 1] = tail;
        rhs[n - 1] = (dx[n - 2] * dx[n - 2] * slope[n - 3]
            + (2.0 * tail + dx[n - 2]) * dx[n - 3] * slope[n - 2])
            / tail;

        let slopes = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

        let coefficients = (0..n - 1)
            .map(|i| {
                let t = (slopes[i] + slopes[i + 1] - 2.0 * slope[i]) / dx[i];
                [
                    t / dx[i],
                    (slope[i] - slopes[i]) / dx[i] - t,
                    slopes[i],
                    y[i],
                ]
            })
            .collect();

        Ok(Self {
            knots: x.to_vec(),
            coefficients,
        })
    }

    /// Value at `at`; NaN outside the knot range.
    pub fn evaluate(&self, at: f64) -> f64 {
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        if !(at >= first && at <= last) {
            return f64::NAN;
        }
        let idx = self
            .knots
            .partition_point(|&knot| knot <= at)
            .saturating_sub(1)
            .min(self.coefficients.len() - 1);
        let h = at - self.knots[idx];
        let [c3, c2, c1, c0] = self.coefficients[idx];
        ((c3 * h + c2) * h + c1) * h + c0
    }
}

/// Thomas algorithm; `lower[0]` and `upper[n-1]` are ignored.
fn solve_tridiagonal(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
    rhs: &[f64],
) -> ProcessingResult<Vec<f64>> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    c_prime[0] = upper[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * c_prime[i - 1];
        if denom.abs() < 1e-300 {
            return Err(ProcessingError::InvalidParameter(
                "singular spline system".into(),
            ));
        }
        c_prime[i] = upper[i] / denom;
        d_prime[i] = (rhs[i] - lower[i] * d_prime[i - 1]) / denom;
    }

    let mut solution = vec![0.0; n];
    solution[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        solution[i] = d_prime[i] - c_prime[i] * solution[i + 1];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(x: f64) -> f64 {
        x * x * x - 2.0 * x * x + 0.5 * x + 1.0
    }

    #[test]
    fn reproduces_a_cubic_exactly() {
        let x = [0.0, 1.0, 2.5, 3.0, 4.5, 6.0];
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let spline = CubicSpline::not_a_knot(&x, &y).unwrap();
        for probe in [0.0, 0.3, 1.7, 2.9, 4.0, 5.99, 6.0] {
            assert!((spline.evaluate(probe) - cubic(probe)).abs() < 1e-9);
        }
    }

    #[test]
    fn passes_through_knots() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 2.0, -1.0, 0.5, 3.0];
        let spline = CubicSpline::not_a_knot(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert!((spline.evaluate(*xi) - yi).abs() < 1e-12);
        }
    }

    #[test]
    fn outside_range_is_nan() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let spline = CubicSpline::not_a_knot(&x, &[1.0, 2.0, 0.0, 1.0]).unwrap();
        assert!(spline.evaluate(-0.1).is_nan());
        assert!(spline.evaluate(3.1).is_nan());
    }

    #[test]
    fn rejects_short_or_unsorted_knots() {
        assert!(CubicSpline::not_a_knot(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).is_err());
        assert!(CubicSpline::not_a_knot(&[0.0, 2.0, 1.0, 3.0], &[0.0; 4]).is_err());
        assert!(CubicSpline::not_a_knot(&[0.0, 1.0, 2.0, 3.0], &[0.0; 3]).is_err());
    }
}
