//! Special functions needed by the closed-form Urbach convolution.
//!
//! The square-root edge convolved with an exponential kernel reduces to two
//! classic functions:
//! - Dawson's integral `F(y) = exp(-y^2) * int_0^y exp(t^2) dt`
//! - the scaled complementary error function `erfcx(x) = exp(x^2) * erfc(x)`
//!
//! Both are evaluated in double precision with a series for small arguments
//! and an asymptotic expansion (or continued fraction) for large ones, so
//! neither ever forms the overflowing `exp(x^2)` on its own.

use std::f64::consts::PI;

const DAWSON_SERIES_LIMIT: f64 = 5.0;
const ERFCX_SERIES_LIMIT: f64 = 3.0;
const CONTINUED_FRACTION_DEPTH: usize = 80;
const MAX_TERMS: usize = 500;

/// Dawson's integral `F(y)`.
///
/// **How it Works**: below `y = 5` the integral is summed as the positive
/// series `sum y^(2n+1) / (n! (2n+1))` and multiplied by `exp(-y^2)`; above,
/// the asymptotic series `sum (2n-1)!! / (2^(n+1) y^(2n+1))` is truncated at
/// its smallest term. `F` is odd, so negative arguments are reflected.
pub fn dawson(y: f64) -> f64 {
    if y < 0.0 {
        return -dawson(-y);
    }
    if y == 0.0 {
        return 0.0;
    }

    if y < DAWSON_SERIES_LIMIT {
        let y2 = y * y;
        let mut term = y;
        let mut sum = y;
        for n in 1..MAX_TERMS {
            term *= y2 / n as f64;
            let contrib = term / (2 * n + 1) as f64;
            sum += contrib;
            if contrib < f64::EPSILON * sum * 0.1 && n as f64 > y2 {
                break;
            }
        }
        sum * (-y2).exp()
    } else {
        let inv_2y2 = 1.0 / (2.0 * y * y);
        let mut term = 0.5 / y;
        let mut sum = term;
        for n in 1..MAX_TERMS {
            let next = term * (2 * n - 1) as f64 * inv_2y2;
            if next >= term || next < f64::EPSILON * sum * 0.1 {
                break;
            }
            term = next;
            sum += term;
        }
        sum
    }
}

/// Scaled complementary error function `exp(x^2) * erfc(x)`.
pub fn erfcx(x: f64) -> f64 {
    if x < 0.0 {
        // erfc(-x) = 2 - erfc(x)
        return 2.0 * (x * x).exp() - erfcx(-x);
    }

    if x < ERFCX_SERIES_LIMIT {
        // erf(x) = 2/sqrt(pi) exp(-x^2) sum (2x^2)^n x / (2n+1)!!
        let x2 = x * x;
        let mut term = x;
        let mut sum = x;
        for n in 1..MAX_TERMS {
            term *= 2.0 * x2 / (2 * n + 1) as f64;
            sum += term;
            if term < f64::EPSILON * sum * 0.1 {
                break;
            }
        }
        x2.exp() - 2.0 / PI.sqrt() * sum
    } else {
        // erfc(x) = exp(-x^2)/sqrt(pi) / (x + (1/2)/(x + 1/(x + (3/2)/(x + ...))))
        let mut t = x;
        for k in (1..=CONTINUED_FRACTION_DEPTH).rev() {
            t = x + (k as f64 / 2.0) / t;
        }
        1.0 / (PI.sqrt() * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dawson_reference_values() {
        // Abramowitz & Stegun table 7.5
        assert_relative_eq!(dawson(0.5), 0.4244363835, max_relative = 1e-9);
        assert_relative_eq!(dawson(1.0), 0.5380795069, max_relative = 1e-9);
        assert_relative_eq!(dawson(0.9241388730), 0.5410442246, max_relative = 1e-8);
        assert_relative_eq!(dawson(2.0), 0.3013403889, max_relative = 1e-9);
        assert_relative_eq!(dawson(-1.0), -0.5380795069, max_relative = 1e-9);
    }

    #[test]
    fn dawson_branches_join() {
        let below = dawson(DAWSON_SERIES_LIMIT - 1e-9);
        let above = dawson(DAWSON_SERIES_LIMIT + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-7);
        // F(y) ~ 1/(2y) for large y
        assert_relative_eq!(dawson(1e4), 0.5e-4, max_relative = 1e-7);
    }

    #[test]
    fn erfcx_reference_values() {
        assert_relative_eq!(erfcx(0.0), 1.0, max_relative = 1e-15);
        // erfc(1) = 0.157299207050285
        assert_relative_eq!(erfcx(1.0), 0.157299207050285 * 1f64.exp(), max_relative = 1e-11);
        // erfc(2) = 0.004677734981047266
        assert_relative_eq!(erfcx(2.0), 0.004677734981047266 * 4f64.exp(), max_relative = 1e-10);
        assert_relative_eq!(erfcx(10.0), 0.05614099274382259, max_relative = 1e-12);
    }

    #[test]
    fn erfcx_branches_join() {
        let below = erfcx(ERFCX_SERIES_LIMIT - 1e-9);
        let above = erfcx(ERFCX_SERIES_LIMIT + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-9);
    }

    #[test]
    fn erfcx_negative_argument() {
        // erfc(-1) = 2 - erfc(1)
        let expected = (2.0 - 0.157299207050285) * 1f64.exp();
        assert_relative_eq!(erfcx(-1.0), expected, max_relative = 1e-11);
    }
}
