//! Snell's law at a planar interface with complex refractive indices.
//!
//! For absorbing media the transmitted angle is complex. Reflectance only
//! needs the normal component of the transmitted wavevector,
//! `n2 cos(theta_t) = sqrt(n2^2 - n1^2 sin^2(theta_i))`, which stays well
//! defined on the principal branch for any pair of indices.

use num_complex::Complex64;

/// Normal component of the transmitted wavevector, `n2 cos(theta_t)`, in units of `k0`.
///
/// **Context**: `theta_t` itself is complex for absorbing media and undefined
/// beyond the critical angle, but the Fresnel amplitudes only depend on this
/// product.
///
/// **How it Works**: evaluates `sqrt(n2^2 - n1^2 sin^2(theta_i))` on the
/// principal branch, so the real part is never negative.
pub fn normal_wavevector(n1: Complex64, n2: Complex64, theta_i: f64) -> Complex64 {
    let sin_i = theta_i.sin();
    (n2 * n2 - n1 * n1 * sin_i * sin_i).sqrt()
}

/// Critical angle for total internal reflection between real indices.
///
/// `None` when `n2 >= n1`, i.e. light always enters the second medium.
pub fn critical_angle(n1: f64, n2: f64) -> Option<f64> {
    if n1 > 0.0 && n2 > 0.0 && n2 < n1 {
        Some((n2 / n1).asin())
    } else {
        None
    }
}

/// Whether light incident at `theta_i` is totally reflected.
///
/// Only non-absorbing media can be totally reflecting; with any absorption
/// the reflectance stays below one and follows the Fresnel amplitudes.
pub fn is_total_internal_reflection(n1: Complex64, n2: Complex64, theta_i: f64) -> bool {
    n1.im == 0.0 && n2.im == 0.0 && n1.re * theta_i.sin() > n2.re
}
