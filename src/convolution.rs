//! Convolution of an absorption edge with the Urbach tail.
//!
//! ```text
//! alpha(E) = 1/(2g) * int alpha_ideal(E - eps) exp(-|eps/g|) d eps
//! ```
//!
//! The integral is evaluated at every energy point of every fit iteration,
//! which makes it the dominant cost of the emission model. Two strategies
//! are available:
//! - [`ConvolutionStrategy::Analytical`] delegates to the absorption model's
//!   closed form and does no integration at all.
//! - [`ConvolutionStrategy::Numerical`] integrates over a truncated kernel
//!   with a composite Gauss-Legendre rule.
//!
//! The strategy is resolved once when the engine is built. Asking for the
//! analytical strategy with a model that has no closed form fails with
//! `UnsupportedCombination`; there is no silent fallback.

use log::trace;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::absorption::AbsorptionModel;
use crate::config::{DEFAULT_QUAD_ORDER, DEFAULT_QUAD_PANELS, DEFAULT_WIDTH_FACTOR};
use crate::error::{ModelError, Result};
use crate::quadrature::GaussLegendre;
use crate::urbach::UrbachTail;

/// Accuracy/speed settings of the numerical convolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericalSettings {
    /// Kernel truncation in multiples of the tail width.
    pub width_factor: f64,
    /// Gauss-Legendre nodes per panel.
    pub order: usize,
    /// Panels per integration segment.
    pub panels: usize,
}

impl Default for NumericalSettings {
    fn default() -> Self {
        Self {
            width_factor: DEFAULT_WIDTH_FACTOR,
            order: DEFAULT_QUAD_ORDER,
            panels: DEFAULT_QUAD_PANELS,
        }
    }
}

/// A validated numerical configuration with its precomputed rule.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericalQuadrature {
    settings: NumericalSettings,
    rule: GaussLegendre,
}

impl NumericalQuadrature {
    pub fn new(settings: NumericalSettings) -> Result<Self> {
        if !settings.width_factor.is_finite() || settings.width_factor <= 0.0 {
            return Err(ModelError::invalid(
                "width_factor",
                settings.width_factor,
                "must be finite and > 0",
            ));
        }
        if settings.panels == 0 {
            return Err(ModelError::invalid("panels", 0.0, "must be at least 1"));
        }
        let rule = GaussLegendre::new(settings.order)?;
        Ok(Self { settings, rule })
    }
}

/// How the convolution is evaluated. Fixed per engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvolutionStrategy {
    Analytical,
    Numerical(NumericalQuadrature),
}

impl ConvolutionStrategy {
    /// Numerical strategy with default quadrature settings.
    pub fn numerical() -> Self {
        ConvolutionStrategy::Numerical(NumericalQuadrature {
            settings: NumericalSettings::default(),
            rule: GaussLegendre::build(DEFAULT_QUAD_ORDER),
        })
    }

    pub fn numerical_with(settings: NumericalSettings) -> Result<Self> {
        Ok(ConvolutionStrategy::Numerical(NumericalQuadrature::new(settings)?))
    }

    /// `Analytical` when `analytical` is set, default numerical otherwise.
    pub fn from_flag(analytical: bool) -> Self {
        if analytical {
            ConvolutionStrategy::Analytical
        } else {
            ConvolutionStrategy::numerical()
        }
    }

    pub fn is_analytical(&self) -> bool {
        matches!(self, ConvolutionStrategy::Analytical)
    }
}

/// Borrowing view that convolves one absorption model with one tail.
#[derive(Debug)]
pub struct ConvolutionEngine<'a, A: AbsorptionModel + ?Sized> {
    absorption: &'a A,
    tail: &'a UrbachTail,
    strategy: &'a ConvolutionStrategy,
}

impl<'a, A: AbsorptionModel + ?Sized> ConvolutionEngine<'a, A> {
    pub fn new(
        absorption: &'a A,
        tail: &'a UrbachTail,
        strategy: &'a ConvolutionStrategy,
    ) -> Result<Self> {
        if strategy.is_analytical() && !absorption.has_tail_convolution() {
            return Err(ModelError::UnsupportedCombination {
                absorption: absorption.label().to_string(),
                kernel: format!("Urbach tail (g = {})", tail.width()),
            });
        }
        Ok(Self {
            absorption,
            tail,
            strategy,
        })
    }

    pub fn strategy(&self) -> &ConvolutionStrategy {
        self.strategy
    }

    pub fn alpha(&self, e: f64) -> Result<f64> {
        let value = match self.strategy {
            ConvolutionStrategy::Analytical => self
                .absorption
                .tail_convolution(e, self.tail)
                .ok_or_else(|| ModelError::UnsupportedCombination {
                    absorption: self.absorption.label().to_string(),
                    kernel: "Urbach tail".to_string(),
                })?,
            ConvolutionStrategy::Numerical(quad) => self.integrate(quad, e),
        };
        if !value.is_finite() {
            return Err(ModelError::domain(e, "absorption coefficient is not finite"));
        }
        Ok(value)
    }

    pub fn alpha_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        let values = energies
            .to_vec()
            .into_par_iter()
            .map(|e| self.alpha(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from(values))
    }

    /// Quadrature over `eps` in `[-N g, N g]`.
    ///
    /// **How it Works**: when the model has an onset the integral is taken
    /// over the absorption energy `x = E - eps` in the variable
    /// `u = sqrt(x - onset)`, which turns a square-root edge into a smooth
    /// integrand and drops the region where the absorption vanishes. The
    /// range is split at the kernel cusp (`eps = 0`, i.e. `u = sqrt(E - onset)`)
    /// so that every segment is smooth for the Gauss-Legendre rule.
    fn integrate(&self, quad: &NumericalQuadrature, e: f64) -> f64 {
        let reach = quad.settings.width_factor * self.tail.width();
        let rule = &quad.rule;
        let panels = quad.settings.panels;

        let total = match self.absorption.onset() {
            Some(onset) => {
                let x_lo = (e - reach).max(onset);
                let x_hi = e + reach;
                if x_hi <= onset {
                    return 0.0;
                }
                let u_lo = (x_lo - onset).sqrt();
                let u_hi = (x_hi - onset).sqrt();
                let f = |u: f64| {
                    let x = onset + u * u;
                    self.absorption.absorption(x) * self.tail.value(e - x) * 2.0 * u
                };
                let cusp = e - onset;
                if cusp > 0.0 && cusp.sqrt() > u_lo && cusp.sqrt() < u_hi {
                    let u_k = cusp.sqrt();
                    rule.integrate(&f, u_lo, u_k, panels) + rule.integrate(&f, u_k, u_hi, panels)
                } else {
                    rule.integrate(&f, u_lo, u_hi, panels)
                }
            }
            None => {
                let f = |eps: f64| self.absorption.absorption(e - eps) * self.tail.value(eps);
                rule.integrate(&f, -reach, 0.0, panels) + rule.integrate(&f, 0.0, reach, panels)
            }
        };
        trace!("numerical alpha({}) = {} (reach {})", e, total, reach);
        total
    }
}
