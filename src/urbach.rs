//! Urbach tail broadening kernel.
//!
//! `tau(E) = 1/(2g) exp(-|E/g|)`, normalised to unit area, with the tail
//! width `g` in eV.

use ndarray::Array1;

use crate::error::{require_positive, Result};

/// Exponential (Urbach) broadening kernel of width `g`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrbachTail {
    g: f64,
}

impl UrbachTail {
    pub fn new(g: f64) -> Result<Self> {
        Ok(Self {
            g: require_positive("g", g)?,
        })
    }

    /// Tail width in eV.
    pub fn width(&self) -> f64 {
        self.g
    }

    /// Returns a kernel with a different width; the receiver is unchanged.
    pub fn with_width(&self, g: f64) -> Result<Self> {
        Self::new(g)
    }

    pub fn value(&self, e: f64) -> f64 {
        (-(e / self.g).abs()).exp() / (2.0 * self.g)
    }

    pub fn value_grid(&self, energies: &Array1<f64>) -> Array1<f64> {
        energies.mapv(|e| self.value(e))
    }
}

impl Default for UrbachTail {
    /// GaAs at room temperature.
    fn default() -> Self {
        Self { g: 0.015 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_is_normalised() {
        for g in [0.001, 0.015, 0.2] {
            let tail = UrbachTail::new(g).unwrap();
            let e = Array1::linspace(-40.0 * g, 40.0 * g, 80_001);
            let de = e[1] - e[0];
            let values = tail.value_grid(&e);
            // trapezoid
            let area = (values.sum() - 0.5 * (values[0] + values[values.len() - 1])) * de;
            assert_relative_eq!(area, 1.0, max_relative = 1e-6);
        }
    }

    #[test]
    fn symmetric_with_peak_at_zero() {
        let tail = UrbachTail::new(0.015).unwrap();
        assert_relative_eq!(tail.value(0.0), 1.0 / 0.03);
        assert_eq!(tail.value(0.01), tail.value(-0.01));
        assert!(tail.value(0.05) < tail.value(0.01));
    }

    #[test]
    fn width_must_be_positive() {
        assert!(UrbachTail::new(0.0).is_err());
        assert!(UrbachTail::new(-0.01).is_err());
        let tail = UrbachTail::default();
        let wider = tail.with_width(0.03).unwrap();
        assert_eq!(tail.width(), 0.015);
        assert_eq!(wider.width(), 0.03);
    }
}
