//! Fresnel reflectance of a planar interface between two media.

use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::fresnel;
use crate::refr_index::{compare_extent, RefractiveIndex};
use crate::snell;

/// Polarization state of the reflected light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Polarization {
    /// Perpendicular to the plane of incidence.
    S,
    /// Parallel to the plane of incidence.
    P,
    /// `(R_s + R_p) / 2`.
    Unpolarized,
    /// Weighted mix `w R_s + (1 - w) R_p`; `w = 0.5` unless a caller supplies one.
    None,
}

impl FromStr for Polarization {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" => Ok(Polarization::S),
            "p" => Ok(Polarization::P),
            "unpolarized" | "unpolarised" => Ok(Polarization::Unpolarized),
            "none" => Ok(Polarization::None),
            _ => Err(ModelError::InvalidPolarization(s.to_string())),
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Polarization::S => "s",
            Polarization::P => "p",
            Polarization::Unpolarized => "unpolarized",
            Polarization::None => "none",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<String> for Polarization {
    type Error = ModelError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Polarization> for String {
    fn from(value: Polarization) -> Self {
        value.to_string()
    }
}

/// Slack on `R <= 1` for rounding in the Fresnel amplitudes.
const UNIT_TOLERANCE: f64 = 1e-9;

/// Reflectance `R(E)` of light incident from `n1` onto `n2` at angle `theta`.
#[derive(Debug, Clone)]
pub struct Reflectance {
    theta: f64,
    pol: Polarization,
    n1: Arc<dyn RefractiveIndex>,
    n2: Arc<dyn RefractiveIndex>,
}

impl Reflectance {
    /// Fails with `InvalidParameter` unless `0 <= theta < pi/2` (radians).
    pub fn new(
        theta: f64,
        pol: Polarization,
        n1: Arc<dyn RefractiveIndex>,
        n2: Arc<dyn RefractiveIndex>,
    ) -> Result<Self> {
        check_theta(theta)?;
        Ok(Self { theta, pol, n1, n2 })
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: f64) -> Result<()> {
        self.theta = check_theta(theta)?;
        Ok(())
    }

    pub fn polarization(&self) -> Polarization {
        self.pol
    }

    pub fn n1(&self) -> &Arc<dyn RefractiveIndex> {
        &self.n1
    }

    pub fn n2(&self) -> &Arc<dyn RefractiveIndex> {
        &self.n2
    }

    /// `(R_s, R_p)` at photon energy `e`.
    ///
    /// Non-absorbing media beyond the critical angle reflect exactly
    /// everything for both polarizations. An absorbing incident medium can
    /// give amplitudes above one; that is a domain error.
    pub fn components(&self, e: f64) -> Result<(f64, f64)> {
        let n1 = self.n1.index_at(e)?;
        let n2 = self.n2.index_at(e)?;
        for n in [n1, n2] {
            if !n.re.is_finite() || !n.im.is_finite() {
                return Err(ModelError::domain(e, format!("refractive index {} is not finite", n)));
            }
        }

        if snell::is_total_internal_reflection(n1, n2, self.theta) {
            return Ok((1.0, 1.0));
        }

        let r = fresnel::refl(n1, n2, self.theta);
        let rp = r[(0, 0)].norm_sqr();
        let rs = r[(1, 1)].norm_sqr();
        if !rp.is_finite() || !rs.is_finite() {
            return Err(ModelError::domain(
                e,
                format!("Fresnel amplitudes undefined for n1 = {}, n2 = {}", n1, n2),
            ));
        }
        if rs > 1.0 + UNIT_TOLERANCE || rp > 1.0 + UNIT_TOLERANCE {
            return Err(ModelError::domain(
                e,
                format!(
                    "reflectance exceeds one (R_s = {}, R_p = {}) for n1 = {}, n2 = {}",
                    rs, rp, n1, n2
                ),
            ));
        }
        // rounding only
        Ok((rs.min(1.0), rp.min(1.0)))
    }

    /// Reflectance with `w` as the s-weight when the polarization is `None`.
    ///
    /// `w` is ignored for the other polarizations.
    pub fn reflectance_weighted(&self, e: f64, w: f64) -> Result<f64> {
        let (rs, rp) = self.components(e)?;
        Ok(match self.pol {
            Polarization::S => rs,
            Polarization::P => rp,
            Polarization::Unpolarized => 0.5 * (rs + rp),
            Polarization::None => w * rs + (1.0 - w) * rp,
        })
    }

    pub fn reflectance(&self, e: f64) -> Result<f64> {
        self.reflectance_weighted(e, 0.5)
    }

    pub fn reflectance_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        let values = energies
            .to_vec()
            .into_par_iter()
            .map(|e| self.reflectance(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from(values))
    }

    /// Fails with `Domain` if either index is undefined somewhere in `range`.
    pub fn check_coverage(&self, range: (f64, f64)) -> Result<()> {
        for n in [&self.n1, &self.n2] {
            if !compare_extent(n.extent(), range)? {
                return Err(ModelError::domain(
                    range.0,
                    format!(
                        "{} is defined on {:?} eV, which does not cover [{}, {}] eV",
                        n.name(),
                        n.extent(),
                        range.0,
                        range.1
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn check_theta(theta: f64) -> Result<f64> {
    if !theta.is_finite() || !(0.0..FRAC_PI_2).contains(&theta) {
        return Err(ModelError::invalid("theta", theta, "must lie in [0, pi/2) radians"));
    }
    Ok(theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refr_index::{AxisUnit, ConstantIndex, TabulatedIndex};
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    fn index(n: f64, k: f64) -> Arc<dyn RefractiveIndex> {
        Arc::new(ConstantIndex::new(Complex64::new(n, k)).unwrap())
    }

    #[test]
    fn normal_incidence_air_to_gaas() {
        let r = Reflectance::new(0.0, Polarization::None, index(1.0, 0.0), index(3.0, 0.0)).unwrap();
        assert_relative_eq!(r.reflectance(1.5).unwrap(), 0.25, max_relative = 1e-12);
        let (rs, rp) = r.components(1.5).unwrap();
        assert_relative_eq!(rs, rp, max_relative = 1e-12);
    }

    #[test]
    fn bounded_for_all_angles() {
        let n2 = index(3.6, 0.2);
        for pol in [Polarization::S, Polarization::P, Polarization::Unpolarized] {
            for i in 0..90 {
                let theta = i as f64 * FRAC_PI_2 / 90.0;
                let r = Reflectance::new(theta, pol, index(1.0, 0.0), n2.clone()).unwrap();
                let value = r.reflectance(1.4).unwrap();
                assert!((0.0..=1.0).contains(&value), "{} at {}: {}", pol, theta, value);
            }
        }
    }

    #[test]
    fn total_internal_reflection_is_exact() {
        let theta_c = snell::critical_angle(1.5, 1.0).unwrap();
        let r = Reflectance::new(theta_c + 0.05, Polarization::S, index(1.5, 0.0), index(1.0, 0.0))
            .unwrap();
        assert_eq!(r.components(2.0).unwrap(), (1.0, 1.0));
        let below =
            Reflectance::new(theta_c - 0.05, Polarization::S, index(1.5, 0.0), index(1.0, 0.0))
                .unwrap();
        assert!(below.reflectance(2.0).unwrap() < 1.0);
    }

    #[test]
    fn absorbing_incident_medium_above_unity_is_domain_error() {
        let r = Reflectance::new(
            60f64.to_radians(),
            Polarization::S,
            index(1.5, 0.5),
            index(1.0, 0.5),
        )
        .unwrap();
        assert!(matches!(r.components(1.5), Err(ModelError::Domain { .. })));
        assert!(r.reflectance(1.5).is_err());
    }

    #[test]
    fn none_polarization_mixes_with_weight() {
        let r = Reflectance::new(1.0, Polarization::None, index(1.0, 0.0), index(2.0, 0.0)).unwrap();
        let (rs, rp) = r.components(1.0).unwrap();
        assert_relative_eq!(r.reflectance(1.0).unwrap(), 0.5 * (rs + rp));
        assert_relative_eq!(r.reflectance_weighted(1.0, 0.8).unwrap(), 0.8 * rs + 0.2 * rp);
        let s = Reflectance::new(1.0, Polarization::S, index(1.0, 0.0), index(2.0, 0.0)).unwrap();
        assert_eq!(s.reflectance_weighted(1.0, 0.8).unwrap(), rs);
    }

    #[test]
    fn parses_polarization() {
        assert_eq!("S".parse::<Polarization>().unwrap(), Polarization::S);
        assert_eq!("unpolarized".parse::<Polarization>().unwrap(), Polarization::Unpolarized);
        assert_eq!(" none ".parse::<Polarization>().unwrap(), Polarization::None);
        assert!(matches!(
            "circular".parse::<Polarization>(),
            Err(ModelError::InvalidPolarization(_))
        ));
    }

    #[test]
    fn rejects_grazing_and_negative_angles() {
        for theta in [-0.1, FRAC_PI_2, 2.0, f64::NAN] {
            assert!(Reflectance::new(theta, Polarization::S, index(1.0, 0.0), index(3.0, 0.0)).is_err());
        }
    }

    #[test]
    fn coverage_follows_index_extent() {
        let table = TabulatedIndex::new(
            "GaAs",
            &[1.2, 1.4, 1.6, 1.8],
            AxisUnit::Ev,
            &[3.5, 3.6, 3.7, 3.8],
            &[0.0, 0.0, 0.1, 0.2],
        )
        .unwrap();
        let r = Reflectance::new(0.0, Polarization::None, index(1.0, 0.0), Arc::new(table)).unwrap();
        assert!(r.check_coverage((1.3, 1.7)).is_ok());
        assert!(matches!(
            r.check_coverage((1.0, 1.7)),
            Err(ModelError::Domain { .. })
        ));
        assert!(r.reflectance(1.0).is_err());
    }
}
