//! Generalized Planck law for the emission of a semiconductor slab.
//!
//! ```text
//! Phi(E) = A(E) * E^2 / (4 pi^2 hbar^3 c^2) / (exp((E - (Efc - Efv)) / kT) - 1)
//! A(E)   = (1 - R(E)) * (1 - exp(-alpha(E) d))
//! ```
//!
//! `R` comes from a [`Reflectance`], `alpha` from the convolution of an
//! [`IdealSqrtAbsorption`] with an [`UrbachTail`]. The composite owns the
//! band gap `Eg` and the tail width `g`: both override the values carried by
//! the sub-components, which contribute `a0`, `E0` and the optical
//! structure. That is what lets a fit move the edge.
//!
//! The structure (reflectance, absorption, tail, strategy) is fixed when the
//! composite is built; [`GeneralizedPlanck::rebuild`] returns a new one.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::absorption::IdealSqrtAbsorption;
use crate::config::{C0, HBAR, KB, MAX_EXP_ARG, NM_TO_CM};
use crate::convolution::{ConvolutionEngine, ConvolutionStrategy};
use crate::error::{ModelError, Result};
use crate::reflectance::Reflectance;
use crate::urbach::UrbachTail;

/// Free parameters of the emission law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanckParams {
    /// Band gap (eV).
    pub eg: f64,
    /// Urbach tail width (eV).
    pub g: f64,
    /// s-weight of an unpolarized (`None`) reflectance.
    pub p: f64,
    /// Temperature (K).
    pub t: f64,
    /// Slab thickness (nm).
    pub d: f64,
    /// Valence-band quasi-Fermi level (eV).
    pub efv: f64,
    /// Conduction-band quasi-Fermi level (eV).
    pub efc: f64,
}

impl PlanckParams {
    pub fn validate(&self) -> Result<()> {
        let positive = [("Eg", self.eg), ("g", self.g), ("T", self.t), ("d", self.d)];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ModelError::invalid(name, value, "must be finite and > 0"));
            }
        }
        if !(0.0..=1.0).contains(&self.p) {
            return Err(ModelError::invalid("p", self.p, "must lie in [0, 1]"));
        }
        for (name, value) in [("Efv", self.efv), ("Efc", self.efc)] {
            if !value.is_finite() {
                return Err(ModelError::invalid(name, value, "must be finite"));
            }
        }
        Ok(())
    }

    /// Quasi-Fermi level splitting `Efc - Efv`.
    pub fn splitting(&self) -> f64 {
        self.efc - self.efv
    }
}

impl Default for PlanckParams {
    /// GaAs at room temperature.
    fn default() -> Self {
        Self {
            eg: 1.42,
            g: 0.01,
            p: 0.8,
            t: 300.0,
            d: 150.0,
            efv: 0.0,
            efc: 0.1,
        }
    }
}

/// Generalized Planck emission `Phi(E)` of an absorbing slab.
#[derive(Debug, Clone)]
pub struct GeneralizedPlanck {
    params: PlanckParams,
    reflectance: Arc<Reflectance>,
    ideal: Arc<IdealSqrtAbsorption>,
    tail: Arc<UrbachTail>,
    strategy: ConvolutionStrategy,
}

impl GeneralizedPlanck {
    /// Fails if `params` are invalid or `strategy` cannot convolve `ideal` with `tail`.
    pub fn new(
        params: PlanckParams,
        reflectance: Arc<Reflectance>,
        ideal: Arc<IdealSqrtAbsorption>,
        tail: Arc<UrbachTail>,
        strategy: ConvolutionStrategy,
    ) -> Result<Self> {
        params.validate()?;
        ConvolutionEngine::new(ideal.as_ref(), tail.as_ref(), &strategy)?;
        Ok(Self {
            params,
            reflectance,
            ideal,
            tail,
            strategy,
        })
    }

    /// New composite with the same parameters and a different structure.
    pub fn rebuild(
        &self,
        reflectance: Arc<Reflectance>,
        ideal: Arc<IdealSqrtAbsorption>,
        tail: Arc<UrbachTail>,
        strategy: ConvolutionStrategy,
    ) -> Result<Self> {
        Self::new(self.params, reflectance, ideal, tail, strategy)
    }

    pub fn params(&self) -> &PlanckParams {
        &self.params
    }

    /// Replaces the parameters; they are validated again at evaluation.
    pub fn set_params(&mut self, params: PlanckParams) {
        self.params = params;
    }

    pub fn reflectance(&self) -> &Arc<Reflectance> {
        &self.reflectance
    }

    pub fn ideal_absorption(&self) -> &Arc<IdealSqrtAbsorption> {
        &self.ideal
    }

    pub fn tail(&self) -> &Arc<UrbachTail> {
        &self.tail
    }

    pub fn strategy(&self) -> &ConvolutionStrategy {
        &self.strategy
    }

    /// Absorption edge at the composite's `Eg` and tail at its `g`.
    fn effective(&self) -> Result<(IdealSqrtAbsorption, UrbachTail)> {
        self.params.validate()?;
        let ideal = self.ideal.rebased(self.params.eg)?.without_tail();
        let tail = self.tail.with_width(self.params.g)?;
        Ok((ideal, tail))
    }

    /// Tail-broadened absorption coefficient (cm^-1).
    pub fn absorption_coefficient(&self, e: f64) -> Result<f64> {
        let (ideal, tail) = self.effective()?;
        ConvolutionEngine::new(&ideal, &tail, &self.strategy)?.alpha(e)
    }

    /// `(1 - R) (1 - exp(-alpha d))`
    pub fn absorptance(&self, e: f64) -> Result<f64> {
        let (ideal, tail) = self.effective()?;
        let engine = ConvolutionEngine::new(&ideal, &tail, &self.strategy)?;
        self.absorptance_with(&engine, e)
    }

    fn absorptance_with(
        &self,
        engine: &ConvolutionEngine<'_, IdealSqrtAbsorption>,
        e: f64,
    ) -> Result<f64> {
        let r = self.reflectance.reflectance_weighted(e, self.params.p)?;
        let alpha = engine.alpha(e)?;
        Ok((1.0 - r) * -(-alpha * self.params.d * NM_TO_CM).exp_m1())
    }

    /// Bose-Einstein-like occupation `1 / (exp(x) - 1)` with `x = (E - (Efc - Efv)) / kT`.
    ///
    /// Fails with `Domain` at the pole `E = Efc - Efv` and where `exp(x)`
    /// would overflow or underflow. Negative values (gain, `E < Efc - Efv`)
    /// are returned as they are.
    pub fn occupation(&self, e: f64) -> Result<f64> {
        self.params.validate()?;
        occupation(e, self.params.splitting(), self.params.t)
    }

    pub fn emission(&self, e: f64) -> Result<f64> {
        let (ideal, tail) = self.effective()?;
        let engine = ConvolutionEngine::new(&ideal, &tail, &self.strategy)?;
        self.emission_with(&engine, e)
    }

    fn emission_with(
        &self,
        engine: &ConvolutionEngine<'_, IdealSqrtAbsorption>,
        e: f64,
    ) -> Result<f64> {
        let absorptance = self.absorptance_with(engine, e)?;
        let occupation = occupation(e, self.params.splitting(), self.params.t)?;
        Ok(absorptance * photon_dos(e) * occupation)
    }

    /// Emission over a grid, points evaluated in parallel.
    pub fn emission_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        let (ideal, tail) = self.effective()?;
        let engine = ConvolutionEngine::new(&ideal, &tail, &self.strategy)?;
        debug!(
            "emission over {} points, Eg = {}, g = {}, analytical = {}",
            energies.len(),
            self.params.eg,
            self.params.g,
            self.strategy.is_analytical()
        );
        let values = energies
            .to_vec()
            .into_par_iter()
            .map(|e| self.emission_with(&engine, e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from(values))
    }
}

/// `E^2 / (4 pi^2 hbar^3 c^2)`
fn photon_dos(e: f64) -> f64 {
    e * e / (4.0 * PI * PI * HBAR.powi(3) * C0 * C0)
}

fn occupation(e: f64, splitting: f64, t: f64) -> Result<f64> {
    let x = (e - splitting) / (KB * t);
    if !x.is_finite() {
        return Err(ModelError::domain(e, "occupation exponent is not finite"));
    }
    if x == 0.0 {
        return Err(ModelError::domain(
            e,
            format!("occupation has a pole at Efc - Efv = {} eV", splitting),
        ));
    }
    if x.abs() > MAX_EXP_ARG {
        return Err(ModelError::domain(
            e,
            format!("occupation exponent {:.1} is out of range", x),
        ));
    }
    Ok(1.0 / x.exp_m1())
}
