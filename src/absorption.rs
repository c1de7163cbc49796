//! Band-edge absorption models.
//!
//! The ideal direct-gap edge is
//!
//! ```text
//! alpha_ideal(E) = 0                              for E <= Eg
//!                = a0 * sqrt((E - Eg)/(E0 - Eg))  for E >  Eg
//! ```
//!
//! with `a0` the absorption coefficient (cm^-1) at the reference energy
//! `E0`. Convolving this edge with an [`UrbachTail`] has a closed form in
//! terms of Dawson's integral and the scaled complementary error function,
//! which removes the quadrature from every evaluation.

use std::f64::consts::PI;
use std::fmt;

use crate::config::ASYMPTOTIC_EDGE_Y;
use crate::error::{require_finite, require_positive, ModelError, Result};
use crate::special::{dawson, erfcx};
use crate::urbach::UrbachTail;

/// An absorption coefficient that can be broadened by an Urbach tail.
pub trait AbsorptionModel: Send + Sync + fmt::Debug {
    /// Human-readable name used in error messages.
    fn label(&self) -> &str;

    /// Unbroadened absorption coefficient at `e`.
    fn absorption(&self, e: f64) -> f64;

    /// Energy below which the absorption vanishes identically, if any.
    ///
    /// Numerical convolution splits its integration range here.
    fn onset(&self) -> Option<f64> {
        None
    }

    /// Whether [`AbsorptionModel::tail_convolution`] is available.
    fn has_tail_convolution(&self) -> bool {
        false
    }

    /// Closed-form convolution with an Urbach tail, if one exists.
    fn tail_convolution(&self, _e: f64, _tail: &UrbachTail) -> Option<f64> {
        None
    }
}

/// Ideal square-root absorption edge, optionally carrying an Urbach tail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealSqrtAbsorption {
    eg: f64,
    e0: f64,
    a0: f64,
    tail: Option<UrbachTail>,
}

impl IdealSqrtAbsorption {
    /// Creates an edge at `eg` with coefficient `a0` at the reference energy `e0`.
    ///
    /// Fails with `InvalidParameter` unless `0 < eg < e0` and `a0 >= 0`.
    pub fn new(eg: f64, e0: f64, a0: f64) -> Result<Self> {
        require_positive("Eg", eg)?;
        require_finite("E0", e0)?;
        require_finite("a0", a0)?;
        if e0 == eg {
            return Err(ModelError::invalid("E0", e0, "must differ from Eg"));
        }
        if e0 < eg {
            return Err(ModelError::invalid("E0", e0, format!("must exceed Eg = {}", eg)));
        }
        if a0 < 0.0 {
            return Err(ModelError::invalid("a0", a0, "must be >= 0"));
        }
        Ok(Self {
            eg,
            e0,
            a0,
            tail: None,
        })
    }

    /// Attaches a tail; [`IdealSqrtAbsorption::evaluate`] then returns the broadened edge.
    pub fn with_tail(mut self, tail: UrbachTail) -> Self {
        self.tail = Some(tail);
        self
    }

    pub fn without_tail(mut self) -> Self {
        self.tail = None;
        self
    }

    /// Same reference point and tail, edge moved to `eg`.
    pub fn rebased(&self, eg: f64) -> Result<Self> {
        let moved = Self::new(eg, self.e0, self.a0)?;
        Ok(Self {
            tail: self.tail,
            ..moved
        })
    }

    pub fn eg(&self) -> f64 {
        self.eg
    }

    pub fn e0(&self) -> f64 {
        self.e0
    }

    pub fn a0(&self) -> f64 {
        self.a0
    }

    pub fn tail(&self) -> Option<&UrbachTail> {
        self.tail.as_ref()
    }

    /// `a0 / sqrt(E0 - Eg)`
    fn prefactor(&self) -> f64 {
        self.a0 / (self.e0 - self.eg).sqrt()
    }

    pub fn absorption(&self, e: f64) -> f64 {
        if e <= self.eg {
            0.0
        } else {
            self.prefactor() * (e - self.eg).sqrt()
        }
    }

    /// Closed-form convolution of the square-root edge with `tail`.
    ///
    /// **How it Works**: with `C = a0/sqrt(E0 - Eg)`, `D = E - Eg` and
    /// `y = sqrt(D/g)` the integral splits into three regimes:
    /// - below the edge (`D <= 0`): `C sqrt(g) sqrt(pi)/4 exp(D/g)`
    /// - near the edge: `C sqrt(g)/2 [2y - F(y) + sqrt(pi)/2 erfcx(y)]`
    /// - far above the edge, where `F` and `erfcx` nearly cancel, the
    ///   bracket is replaced by its asymptotic series
    ///   `2y - sum_{n odd} (2n-1)!!/(2^n y^(2n+1))`.
    pub fn convolution_with_tail(&self, e: f64, tail: &UrbachTail) -> f64 {
        let g = tail.width();
        let c = self.prefactor();
        let delta = e - self.eg;

        if delta <= 0.0 {
            return c * g.sqrt() * PI.sqrt() / 4.0 * (delta / g).exp();
        }

        let y = (delta / g).sqrt();
        let bracket = if y < ASYMPTOTIC_EDGE_Y {
            2.0 * y - dawson(y) + 0.5 * PI.sqrt() * erfcx(y)
        } else {
            2.0 * y - edge_correction(y)
        };
        0.5 * c * g.sqrt() * bracket
    }

    /// Broadened value when a tail is attached, the ideal edge otherwise.
    pub fn evaluate(&self, e: f64) -> f64 {
        match &self.tail {
            Some(tail) => self.convolution_with_tail(e, tail),
            None => self.absorption(e),
        }
    }
}

impl Default for IdealSqrtAbsorption {
    /// GaAs
    fn default() -> Self {
        Self {
            eg: 1.42,
            e0: 1.6,
            a0: 14800.0,
            tail: None,
        }
    }
}

impl AbsorptionModel for IdealSqrtAbsorption {
    fn label(&self) -> &str {
        "ideal sqrt absorption"
    }

    fn absorption(&self, e: f64) -> f64 {
        IdealSqrtAbsorption::absorption(self, e)
    }

    fn onset(&self) -> Option<f64> {
        Some(self.eg)
    }

    fn has_tail_convolution(&self) -> bool {
        true
    }

    fn tail_convolution(&self, e: f64, tail: &UrbachTail) -> Option<f64> {
        Some(self.convolution_with_tail(e, tail))
    }
}

/// `sum_{n odd} (2n-1)!! / (2^n y^(2n+1))`, truncated at its smallest term.
fn edge_correction(y: f64) -> f64 {
    let y4 = y.powi(4);
    let mut term = 0.5 / y.powi(3);
    let mut sum = term;
    let mut n = 1usize;
    loop {
        let next = term * ((2 * n + 1) * (2 * n + 3)) as f64 / (4.0 * y4);
        if next >= term || next < f64::EPSILON * sum * 0.1 {
            break;
        }
        term = next;
        sum += term;
        n += 2;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gaas() -> IdealSqrtAbsorption {
        IdealSqrtAbsorption::new(1.42, 1.6, 14800.0).unwrap()
    }

    /// Brute-force trapezoid convolution on a fine grid.
    fn brute_force(model: &IdealSqrtAbsorption, tail: &UrbachTail, e: f64) -> f64 {
        let g = tail.width();
        let n = 400_000;
        let lo = -30.0 * g;
        let hi = 30.0 * g;
        let h = (hi - lo) / n as f64;
        let f = |eps: f64| model.absorption(e - eps) * tail.value(eps);
        let mut sum = 0.5 * (f(lo) + f(hi));
        for i in 1..n {
            sum += f(lo + i as f64 * h);
        }
        sum * h
    }

    #[test]
    fn zero_at_and_below_gap() {
        let model = gaas();
        for e in [0.0, 0.5, 1.0, 1.41, 1.42] {
            assert_eq!(model.absorption(e), 0.0);
        }
        assert_relative_eq!(model.absorption(1.6), 14800.0, max_relative = 1e-12);
    }

    #[test]
    fn rejects_degenerate_reference() {
        assert!(matches!(
            IdealSqrtAbsorption::new(1.42, 1.42, 14800.0),
            Err(ModelError::InvalidParameter { .. })
        ));
        assert!(IdealSqrtAbsorption::new(1.6, 1.42, 14800.0).is_err());
        assert!(IdealSqrtAbsorption::new(1.42, 1.6, -1.0).is_err());
        assert!(IdealSqrtAbsorption::new(0.0, 1.6, 1.0).is_err());
    }

    #[test]
    fn closed_form_matches_brute_force() {
        let model = gaas();
        let tail = UrbachTail::new(0.015).unwrap();
        for e in [1.30, 1.40, 1.42, 1.43, 1.45, 1.52, 1.6] {
            let analytical = model.convolution_with_tail(e, &tail);
            let numerical = brute_force(&model, &tail, e);
            let rel = (analytical - numerical).abs() / numerical.abs().max(1.0);
            assert!(rel < 1e-4, "E = {}: {} vs {}", e, analytical, numerical);
        }
    }

    #[test]
    fn continuous_across_regimes() {
        let model = gaas();
        let tail = UrbachTail::new(0.01).unwrap();
        let eps = 1e-10;
        // edge itself
        assert_relative_eq!(
            model.convolution_with_tail(1.42 - eps, &tail),
            model.convolution_with_tail(1.42 + eps, &tail),
            max_relative = 1e-4
        );
        // switch to the asymptotic series
        let e_switch = 1.42 + ASYMPTOTIC_EDGE_Y.powi(2) * 0.01;
        assert_relative_eq!(
            model.convolution_with_tail(e_switch - eps, &tail),
            model.convolution_with_tail(e_switch + eps, &tail),
            max_relative = 1e-9
        );
    }

    #[test]
    fn tends_to_ideal_far_above_edge() {
        let model = gaas();
        let tail = UrbachTail::new(0.001).unwrap();
        assert_relative_eq!(
            model.convolution_with_tail(1.8, &tail),
            model.absorption(1.8),
            max_relative = 1e-5
        );
    }

    #[test]
    fn evaluate_follows_tail_flag() {
        let tail = UrbachTail::new(0.015).unwrap();
        let ideal = gaas();
        let tailed = ideal.with_tail(tail);
        assert_eq!(ideal.evaluate(1.40), 0.0);
        assert!(tailed.evaluate(1.40) > 0.0);
        assert_eq!(tailed.without_tail().evaluate(1.40), 0.0);
    }

    #[test]
    fn rebased_keeps_reference_and_tail() {
        let tail = UrbachTail::new(0.015).unwrap();
        let model = gaas().with_tail(tail).rebased(1.39).unwrap();
        assert_eq!(model.eg(), 1.39);
        assert_eq!(model.e0(), 1.6);
        assert_eq!(model.tail(), Some(&tail));
        assert!(gaas().rebased(1.6).is_err());
    }
}
