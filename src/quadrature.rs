//! Fixed-order Gauss-Legendre quadrature.

use std::f64::consts::PI;

use crate::error::{ModelError, Result};

/// Gauss-Legendre nodes and weights on [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Computes an `order`-point rule by Newton iteration on the Legendre
    /// polynomial roots, starting from the Chebyshev-like guess
    /// `cos(pi (i - 1/4) / (n + 1/2))`.
    pub fn new(order: usize) -> Result<Self> {
        if order < 2 {
            return Err(ModelError::invalid(
                "order",
                order as f64,
                "quadrature order must be at least 2",
            ));
        }
        Ok(Self::build(order))
    }

    /// Unvalidated constructor; `n` must be at least 2.
    pub(crate) fn build(n: usize) -> Self {
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let half = (n + 1) / 2;

        for i in 0..half {
            let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut dp = 0.0;
            for _ in 0..100 {
                // three-term recurrence for P_n(z) and P_{n-1}(z)
                let mut p1 = 1.0;
                let mut p2 = 0.0;
                for j in 0..n {
                    let p3 = p2;
                    p2 = p1;
                    p1 = ((2 * j + 1) as f64 * z * p2 - j as f64 * p3) / (j + 1) as f64;
                }
                dp = n as f64 * (z * p1 - p2) / (z * z - 1.0);
                let dz = p1 / dp;
                z -= dz;
                if dz.abs() < 1e-15 {
                    break;
                }
            }
            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }

        Self { nodes, weights }
    }

    /// Integrates `f` over `[a, b]` split into `panels` equal panels.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64, panels: usize) -> f64
    where
        F: Fn(f64) -> f64,
    {
        if b == a || panels == 0 {
            return 0.0;
        }
        let width = (b - a) / panels as f64;
        let half = 0.5 * width;
        (0..panels)
            .map(|k| {
                let mid = a + (k as f64 + 0.5) * width;
                self.nodes
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(x, w)| w * f(mid + half * x))
                    .sum::<f64>()
                    * half
            })
            .sum()
    }
}
