//! Synthetic spectra for demonstrations and tests.

use anyhow::{anyhow, Context, Result};
use log::debug;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::model::Model;

/// Evaluates `model` on `energies` and optionally adds Gaussian noise.
///
/// `noise` is the standard deviation relative to the peak of the clean
/// curve. A fixed `seed` makes the noise reproducible.
pub fn synthesize(
    model: &Model,
    energies: &Array1<f64>,
    noise: Option<f64>,
    seed: Option<u64>,
) -> Result<Array1<f64>> {
    let clean = model
        .evaluate_grid(energies)
        .context("evaluating the model for a synthetic spectrum")?;
    let sigma = match noise {
        None => return Ok(clean),
        Some(s) if s == 0.0 => return Ok(clean),
        Some(s) => s,
    };

    let peak = clean.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let normal = Normal::new(0.0, sigma * peak)
        .map_err(|e| anyhow!("invalid noise level {}: {}", sigma, e))?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    debug!(
        "adding noise with sd {:e} to {} points (seed {:?})",
        sigma * peak,
        clean.len(),
        seed
    );
    Ok(clean.mapv(|v| v + normal.sample(&mut rng)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorentzian::LorentzianPeak;

    fn model() -> Model {
        let mut model = Model::new();
        model
            .add("peak", Box::new(LorentzianPeak::new(1.0, 0.1, 1.4).unwrap()))
            .unwrap();
        model
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let energies = Array1::linspace(1.2, 1.6, 81);
        let a = synthesize(&model(), &energies, Some(0.01), Some(7)).unwrap();
        let b = synthesize(&model(), &energies, Some(0.01), Some(7)).unwrap();
        let c = synthesize(&model(), &energies, Some(0.01), Some(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn noiseless_matches_model() {
        let energies = Array1::linspace(1.2, 1.6, 81);
        let clean = synthesize(&model(), &energies, None, None).unwrap();
        assert_eq!(clean, model().evaluate_grid(&energies).unwrap());
        assert!(synthesize(&model(), &energies, Some(-1.0), Some(1)).is_err());
    }
}
