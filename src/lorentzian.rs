//! Lorentzian peak parametrised by height and full width at half maximum.
//!
//! `f(E) = h W^2 / (4 (E - x0)^2 + W^2)`, area `A = pi h W / 2`.

use itertools::Itertools;

use crate::error::{require_finite, require_positive, ModelError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LorentzianPeak {
    height: f64,
    fwhm: f64,
    centre: f64,
}

impl LorentzianPeak {
    pub fn new(height: f64, fwhm: f64, centre: f64) -> Result<Self> {
        Ok(Self {
            height: require_finite("height", height)?,
            fwhm: require_positive("fwhm", fwhm)?,
            centre: require_finite("centre", centre)?,
        })
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    pub fn centre(&self) -> f64 {
        self.centre
    }

    pub fn set_height(&mut self, height: f64) -> Result<()> {
        self.height = require_finite("height", height)?;
        Ok(())
    }

    pub fn set_fwhm(&mut self, fwhm: f64) -> Result<()> {
        self.fwhm = require_positive("fwhm", fwhm)?;
        Ok(())
    }

    pub fn set_centre(&mut self, centre: f64) -> Result<()> {
        self.centre = require_finite("centre", centre)?;
        Ok(())
    }

    /// Area under the peak.
    pub fn area(&self) -> f64 {
        0.5 * std::f64::consts::PI * self.height * self.fwhm
    }

    /// Sets the area by rescaling the height at fixed width.
    pub fn set_area(&mut self, area: f64) -> Result<()> {
        require_finite("A", area)?;
        self.height = 2.0 * area / (std::f64::consts::PI * self.fwhm);
        Ok(())
    }

    pub fn value(&self, e: f64) -> f64 {
        let w2 = self.fwhm * self.fwhm;
        self.height * w2 / (4.0 * (e - self.centre).powi(2) + w2)
    }

    /// Initial guess from a sampled peak.
    ///
    /// **How it Works**: the centre is the median of the cumulative
    /// distribution of `data`, the width its inter-quartile range (which is
    /// exactly the FWHM of a Lorentzian) and the height the data maximum.
    /// The estimate degrades when the window cuts off much of the wings.
    pub fn estimate(energies: &[f64], data: &[f64]) -> Result<Self> {
        if energies.len() != data.len() || energies.len() < 3 {
            return Err(ModelError::invalid(
                "data",
                data.len() as f64,
                format!(
                    "need at least 3 points with matching lengths, got {} energies and {} values",
                    energies.len(),
                    data.len()
                ),
            ));
        }

        let cdf: Vec<f64> = data
            .iter()
            .scan(0.0, |acc, y| {
                *acc += y;
                Some(*acc)
            })
            .collect();
        let top = cdf.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(top > 0.0) {
            return Err(ModelError::invalid("data", top, "cumulative sum must be positive"));
        }

        let closest = |q: f64| {
            cdf.iter()
                .position_min_by(|a, b| (q - *a / top).abs().total_cmp(&(q - *b / top).abs()))
                .unwrap_or(0)
        };
        let centre = energies[closest(0.5)];
        let fwhm = (energies[closest(0.75)] - energies[closest(0.25)]).abs();
        let height = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self::new(height, fwhm, centre)
    }
}

impl Default for LorentzianPeak {
    fn default() -> Self {
        Self {
            height: 1.0,
            fwhm: 1.0,
            centre: 0.0,
        }
    }
}
