//! Natural cubic spline through tabulated optical constants.

use itertools::Itertools;

use crate::error::{ModelError, Result};

/// Natural cubic spline (zero second derivative at both ends).
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Builds the spline; `xs` must be strictly increasing with at least two points.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(ModelError::invalid(
                "table",
                xs.len() as f64,
                format!("{} abscissae but {} values", xs.len(), ys.len()),
            ));
        }
        if xs.len() < 2 {
            return Err(ModelError::invalid(
                "table",
                xs.len() as f64,
                "at least two points are needed",
            ));
        }
        if let Some((i, _)) = xs
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (a, b))| !(b > a))
        {
            return Err(ModelError::invalid(
                "table",
                xs[i + 1],
                format!("abscissae must be strictly increasing (index {})", i + 1),
            ));
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // forward sweep of the tridiagonal system
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        // back substitution
        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Ok(Self { xs, ys, y2s })
    }

    pub fn extent(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluates the spline; outside the knots the end polynomials are extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn passes_through_knots() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.0, 3.0, 5.0, 4.0, 1.0];
        let spline = CubicSpline::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_abs_diff_eq!(spline.evaluate(*x), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn reproduces_straight_line() {
        let xs: Vec<f64> = (0..6).map(|i| i as f64 * 0.3).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 - 2.0 * x).collect();
        let spline = CubicSpline::new(xs, ys).unwrap();
        assert_abs_diff_eq!(spline.evaluate(0.45), 2.1, epsilon = 1e-12);
    }

    #[test]
    fn rejects_unsorted_and_short_tables() {
        assert!(CubicSpline::new(vec![1.0, 1.0], vec![0.0, 1.0]).is_err());
        assert!(CubicSpline::new(vec![2.0, 1.0, 3.0], vec![0.0, 1.0, 2.0]).is_err());
        assert!(CubicSpline::new(vec![1.0], vec![0.0]).is_err());
        assert!(CubicSpline::new(vec![1.0, 2.0], vec![0.0]).is_err());
    }
}
