//! Fresnel amplitude coefficients at a planar interface.
//!
//! Indices are complex, so absorbing media are handled directly. The
//! coefficients are returned as a diagonal matrix acting on the `(p, s)`
//! components of the incident amplitude.

use nalgebra::{Matrix2, Vector2};
use num_complex::Complex64;

use crate::snell;

/// Computes Fresnel reflection amplitudes for light going from `n1` into `n2`.
///
/// **Context**: the reflected amplitude depends on polarization, incidence
/// angle and both indices. Reflectances follow as `|r|^2` of the diagonal
/// entries.
///
/// **How it Works**: with `k = n2 cos(theta_t)` from [`snell::normal_wavevector`],
/// - `r_p = (n2^2 cos(theta_i) - n1 k) / (n2^2 cos(theta_i) + n1 k)`
/// - `r_s = (n1 cos(theta_i) - k) / (n1 cos(theta_i) + k)`
///
/// and the result is `diag(r_p, r_s)`.
///
/// # Example
/// ```rust
/// use genplanck::fresnel;
/// use num_complex::Complex64;
///
/// let r = fresnel::refl(Complex64::new(1.0, 0.0), Complex64::new(3.0, 0.0), 0.0);
/// assert!((r[(1, 1)].norm_sqr() - 0.25).abs() < 1e-12);
/// ```
pub fn refl(n1: Complex64, n2: Complex64, theta_i: f64) -> Matrix2<Complex64> {
    let cti = theta_i.cos();
    let k = snell::normal_wavevector(n1, n2, theta_i);
    let n2sq = n2 * n2;
    let f11 = (n2sq * cti - n1 * k) / (n2sq * cti + n1 * k);
    let f22 = (n1 * cti - k) / (n1 * cti + k);
    Matrix2::from_diagonal(&Vector2::new(f11, f22))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn real(n: f64) -> Complex64 {
        Complex64::new(n, 0.0)
    }

    #[test]
    fn normal_incidence_polarizations_agree() {
        let r = refl(real(1.0), real(1.5), 0.0);
        assert_relative_eq!(r[(0, 0)].norm_sqr(), 0.04, max_relative = 1e-12);
        assert_relative_eq!(r[(1, 1)].norm_sqr(), 0.04, max_relative = 1e-12);
    }

    #[test]
    fn brewster_angle_extinguishes_p() {
        let theta_b = 1.5f64.atan();
        let r = refl(real(1.0), real(1.5), theta_b);
        assert!(r[(0, 0)].norm() < 1e-12);
        assert!(r[(1, 1)].norm() > 0.1);
    }

    #[test]
    fn grazing_incidence_reflects_everything() {
        let r = refl(real(1.0), real(1.5), 0.5 * std::f64::consts::PI - 1e-9);
        assert_relative_eq!(r[(0, 0)].norm_sqr(), 1.0, max_relative = 1e-6);
        assert_relative_eq!(r[(1, 1)].norm_sqr(), 1.0, max_relative = 1e-6);
    }
}
