//! Least-squares fitting of a [`Model`] to a measured spectrum.
//!
//! - [`levenberg_marquardt`] refines the free parameters from their current
//!   values, respecting bounds by projection.
//! - [`grid_search`] scans a cartesian grid of parameter values in parallel
//!   and is typically used to find a starting point for the former.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Stopping criteria and numerical knobs of the optimiser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iter: usize,
    /// Relative change of chi-squared below which the fit has converged.
    pub ftol: f64,
    /// Relative step size below which the fit has converged.
    pub xtol: f64,
    /// Initial damping.
    pub lambda: f64,
    /// Relative forward-difference step of the Jacobian.
    pub diff_step: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            lambda: 1e-3,
            diff_step: 1e-6,
        }
    }
}

/// Outcome of a fit, in free-parameter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// One-sigma standard errors, when the curvature matrix is invertible.
    pub stderr: Option<Vec<f64>>,
    pub chi2: f64,
    pub reduced_chi2: f64,
    pub iterations: usize,
    pub converged: bool,
}

const LAMBDA_MAX: f64 = 1e12;

/// Weighted residuals `w_i (y_i - f(E_i))`.
fn residuals(
    model: &Model,
    energies: &Array1<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<DVector<f64>> {
    let curve = model.evaluate_grid(energies)?;
    let r = match weights {
        Some(w) => (data - &curve) * w,
        None => data - &curve,
    };
    if let Some((i, _)) = r.iter().find_position(|v| !v.is_finite()) {
        return Err(anyhow!("residual is not finite at E = {}", energies[i]));
    }
    Ok(DVector::from_iterator(r.len(), r.iter().copied()))
}

/// Sum of squared weighted residuals at the model's current parameters.
pub fn chi_squared(
    model: &Model,
    energies: &Array1<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<f64> {
    Ok(residuals(model, energies, data, weights)?.norm_squared())
}

fn check_inputs(
    energies: &Array1<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<()> {
    if energies.len() != data.len() {
        return Err(anyhow!(
            "{} energies but {} data points",
            energies.len(),
            data.len()
        ));
    }
    if let Some(w) = weights {
        if w.len() != data.len() {
            return Err(anyhow!("{} weights for {} data points", w.len(), data.len()));
        }
    }
    Ok(())
}

/// Forward-difference Jacobian of the weighted model curve, one column per
/// free parameter, columns computed in parallel.
///
/// Steps that would leave the bounds (or that the model rejects) are taken
/// backwards instead.
fn jacobian(
    model: &Model,
    energies: &Array1<f64>,
    base: &DVector<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
    diff_step: f64,
) -> Result<DMatrix<f64>> {
    let x = model.free_values();
    let bounds = model.free_bounds();
    let columns = (0..x.len())
        .into_par_iter()
        .map(|k| -> Result<Vec<f64>> {
            let h = diff_step * x[k].abs().max(1e-2);
            let forward = x[k] + h <= bounds[k].1;
            let mut last_err = None;
            for step in if forward { [h, -h] } else { [-h, h] } {
                let mut trial = x.clone();
                trial[k] += step;
                let mut shifted = model.clone();
                let r = shifted
                    .set_free_values(&trial)
                    .and_then(|_| residuals(&shifted, energies, data, weights));
                match r {
                    // residuals are y - f, so df = -(r' - r)
                    Ok(r) => return Ok((base - r).iter().map(|d| d / step).collect()),
                    Err(e) => last_err = Some(e),
                }
            }
            Err(last_err
                .unwrap_or_else(|| anyhow!("no finite-difference step available"))
                .context(format!("differentiating parameter {} at {:?}", k, x)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DMatrix::from_fn(base.len(), x.len(), |i, k| columns[k][i]))
}

/// Bounded Levenberg-Marquardt fit of the model's free parameters.
///
/// **How it Works**: at each iteration the forward-difference Jacobian `J`
/// gives the damped normal equations `(J^T J + lambda diag(J^T J)) dx = J^T r`.
/// The proposal `x + dx` is projected onto the bounds. If the model rejects
/// it or chi-squared does not decrease, `lambda` grows tenfold and the step is
/// retried; otherwise it is accepted and `lambda` shrinks tenfold. The fit
/// stops when the relative chi-squared decrease drops below `ftol`, the
/// relative step below `xtol`, or after `max_iter` iterations. Running out
/// of damping (`lambda` above 1e12) also stops the fit, but is not reported
/// as converged.
///
/// On return the model holds the best parameters found.
pub fn levenberg_marquardt(
    model: &mut Model,
    energies: &Array1<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
    options: &FitOptions,
) -> Result<FitReport> {
    check_inputs(energies, data, weights)?;
    let names = model.free_names();
    let n = names.len();
    if n == 0 {
        return Err(anyhow!("the model has no free parameters"));
    }
    let m = energies.len();
    if m < n {
        return Err(anyhow!("{} data points cannot constrain {} parameters", m, n));
    }

    let start = Instant::now();
    let mut x = model.clamp_free(&model.free_values());
    model
        .set_free_values(&x)
        .with_context(|| format!("initial parameters {:?} = {:?}", names, x))?;
    let mut r = residuals(model, energies, data, weights)
        .with_context(|| format!("evaluating initial parameters {:?} = {:?}", names, x))?;
    let mut chi2 = r.norm_squared();
    let mut lambda = options.lambda;
    let mut converged = false;
    let mut iterations = 0;
    info!("fitting {:?}, initial chi2 = {:e}", names, chi2);

    'outer: while iterations < options.max_iter {
        iterations += 1;
        let j = jacobian(model, energies, &r, data, weights, options.diff_step)?;
        let jt = j.transpose();
        let a = &jt * &j;
        let g = &jt * &r;

        loop {
            let mut damped = a.clone();
            for k in 0..n {
                damped[(k, k)] += lambda * a[(k, k)].max(f64::MIN_POSITIVE);
            }
            let step = match damped.clone().cholesky() {
                Some(c) => Some(c.solve(&g)),
                None => damped.lu().solve(&g),
            };
            let Some(dx) = step else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    warn!("normal equations are singular, stopping");
                    break 'outer;
                }
                continue;
            };

            let proposal: Vec<f64> = x.iter().zip(dx.iter()).map(|(a, b)| a + b).collect();
            let proposal = model.clamp_free(&proposal);
            let moved = proposal
                .iter()
                .zip(x.iter())
                .map(|(p, q)| (p - q).powi(2))
                .sum::<f64>()
                .sqrt();
            let scale = x.iter().map(|v| v * v).sum::<f64>().sqrt();
            if moved <= options.xtol * (scale + options.xtol) {
                converged = true;
                break 'outer;
            }

            let mut trial = model.clone();
            let outcome = trial
                .set_free_values(&proposal)
                .and_then(|_| residuals(&trial, energies, data, weights));
            match outcome {
                Ok(r_new) if r_new.norm_squared() < chi2 => {
                    let chi2_new = r_new.norm_squared();
                    let decrease = (chi2 - chi2_new) / chi2.max(f64::MIN_POSITIVE);
                    debug!(
                        "iteration {}: chi2 {:e} -> {:e}, lambda {:e}",
                        iterations, chi2, chi2_new, lambda
                    );
                    *model = trial;
                    x = proposal;
                    r = r_new;
                    chi2 = chi2_new;
                    lambda = (lambda / 10.0).max(1e-12);
                    if decrease < options.ftol || chi2 == 0.0 {
                        converged = true;
                        break 'outer;
                    }
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!("rejected proposal {:?}: {:#}", proposal, e),
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                warn!("damping exhausted at iteration {} without improving chi2", iterations);
                break 'outer;
            }
        }
    }

    let dof = m.saturating_sub(n).max(1);
    let reduced_chi2 = chi2 / dof as f64;
    let stderr = jacobian(model, energies, &r, data, weights, options.diff_step)
        .ok()
        .and_then(|j| (j.transpose() * &j).try_inverse())
        .map(|cov| {
            (0..n)
                .map(|k| (cov[(k, k)] * reduced_chi2).max(0.0).sqrt())
                .collect()
        });

    info!(
        "fit finished after {} iterations in {:.2?}: chi2 = {:e}, converged = {}",
        iterations,
        start.elapsed(),
        chi2,
        converged
    );
    if !converged {
        warn!("fit stopped without converging after {} iterations", iterations);
    }

    Ok(FitReport {
        names,
        values: x,
        stderr,
        chi2,
        reduced_chi2,
        iterations,
        converged,
    })
}

/// Values to scan for one parameter, addressed as `component.parameter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub parameter: String,
    pub values: Vec<f64>,
}

impl GridAxis {
    pub fn linspace(parameter: impl Into<String>, start: f64, stop: f64, n: usize) -> Self {
        Self {
            parameter: parameter.into(),
            values: Array1::linspace(start, stop, n).to_vec(),
        }
    }
}

/// Best point of a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub parameters: Vec<String>,
    pub values: Vec<f64>,
    pub chi2: f64,
    /// Grid points at which the model could not be evaluated.
    pub failed: usize,
}

/// Evaluates chi-squared at every point of the cartesian product of `axes`
/// and leaves the model at the best one.
///
/// Points the model rejects are counted and skipped.
pub fn grid_search(
    model: &mut Model,
    energies: &Array1<f64>,
    data: &Array1<f64>,
    weights: Option<&Array1<f64>>,
    axes: &[GridAxis],
) -> Result<GridResult> {
    check_inputs(energies, data, weights)?;
    if axes.is_empty() || axes.iter().any(|a| a.values.is_empty()) {
        return Err(anyhow!("grid search needs at least one non-empty axis"));
    }
    let targets = axes
        .iter()
        .map(|a| -> Result<(String, String)> {
            let (component, parameter) = a
                .parameter
                .rsplit_once('.')
                .ok_or_else(|| anyhow!("expected component.parameter, got '{}'", a.parameter))?;
            model
                .parameter(component, parameter)
                .ok_or_else(|| anyhow!("unknown parameter '{}'", a.parameter))?;
            Ok((component.to_string(), parameter.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let points: Vec<Vec<f64>> = axes
        .iter()
        .map(|a| a.values.clone())
        .multi_cartesian_product()
        .collect();

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        )
        .context("building progress bar style")?
        .progress_chars("█▇▆▅▄▃▂▁"),
    );
    pb.set_message("grid point".to_string());

    let scores: Vec<Option<f64>> = points
        .par_iter()
        .map(|point| {
            let mut candidate = model.clone();
            let chi2 = targets
                .iter()
                .zip(point)
                .try_for_each(|((c, p), v)| candidate.set_parameter(c, p, *v))
                .and_then(|_| chi_squared(&candidate, energies, data, weights))
                .ok();
            pb.inc(1);
            chi2
        })
        .collect();
    pb.finish_and_clear();

    let failed = scores.iter().filter(|s| s.is_none()).count();
    let (best, chi2) = scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|c| (i, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| anyhow!("the model failed at all {} grid points", points.len()))?;

    for ((c, p), v) in targets.iter().zip(&points[best]) {
        model.set_parameter(c, p, *v)?;
    }
    info!(
        "grid search over {} points ({} failed): best chi2 = {:e} at {:?}",
        points.len(),
        failed,
        chi2,
        points[best]
    );

    Ok(GridResult {
        parameters: axes.iter().map(|a| a.parameter.clone()).collect(),
        values: points[best].clone(),
        chi2,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::error;
    use crate::lorentzian::LorentzianPeak;
    use crate::params::Parameter;

    /// `E (1 + |a - 1|)`: a minimum at `a = 1` that forward differences
    /// cannot see.
    #[derive(Debug, Clone)]
    struct Kink {
        a: f64,
    }

    impl Component for Kink {
        fn kind(&self) -> &'static str {
            "Kink"
        }

        fn parameter_names(&self) -> &'static [&'static str] {
            &["a"]
        }

        fn values(&self) -> Vec<f64> {
            vec![self.a]
        }

        fn set_values(&mut self, values: &[f64]) -> error::Result<()> {
            self.a = values[0];
            Ok(())
        }

        fn evaluate(&self, e: f64) -> error::Result<f64> {
            Ok(e * (1.0 + (self.a - 1.0).abs()))
        }

        fn boxed_clone(&self) -> Box<dyn Component> {
            Box::new(self.clone())
        }
    }

    fn peak_model(height: f64, fwhm: f64, centre: f64) -> Model {
        let mut model = Model::new();
        let params = vec![
            Parameter::new("height", height),
            Parameter::new("fwhm", fwhm)
                .with_bounds(Some(1e-3), Some(1.0))
                .unwrap(),
            Parameter::new("centre", centre),
        ];
        model
            .add_with("peak", Box::new(LorentzianPeak::default()), params)
            .unwrap();
        model
    }

    fn synthetic() -> (Array1<f64>, Array1<f64>) {
        let truth = LorentzianPeak::new(2.0, 0.08, 1.30).unwrap();
        let energies = Array1::linspace(1.0, 1.6, 301);
        let data = energies.mapv(|e| truth.value(e));
        (energies, data)
    }

    #[test]
    fn recovers_lorentzian() {
        let (energies, data) = synthetic();
        let mut model = peak_model(1.5, 0.12, 1.28);
        let report =
            levenberg_marquardt(&mut model, &energies, &data, None, &FitOptions::default())
                .unwrap();
        assert!(report.converged);
        assert!((report.values[0] - 2.0).abs() < 1e-6);
        assert!((report.values[1] - 0.08).abs() < 1e-8);
        assert!((report.values[2] - 1.30).abs() < 1e-8);
        assert!(report.chi2 < 1e-12);
        assert_eq!(model.free_values(), report.values);
    }

    #[test]
    fn respects_bounds() {
        let (energies, data) = synthetic();
        let mut bounded = Model::new();
        let params = vec![
            Parameter::new("height", 1.5),
            Parameter::new("fwhm", 0.05)
                .with_bounds(Some(0.01), Some(0.06))
                .unwrap(),
            Parameter::new("centre", 1.28),
        ];
        bounded
            .add_with("peak", Box::new(LorentzianPeak::default()), params)
            .unwrap();
        let report =
            levenberg_marquardt(&mut bounded, &energies, &data, None, &FitOptions::default())
                .unwrap();
        assert!(report.values[1] <= 0.06);
        assert!(report.chi2 > 0.0);
    }

    #[test]
    fn rejects_mismatched_data() {
        let (energies, _) = synthetic();
        let mut model = peak_model(1.5, 0.12, 1.28);
        let short = Array1::zeros(10);
        assert!(levenberg_marquardt(&mut model, &energies, &short, None, &FitOptions::default())
            .is_err());
    }

    #[test]
    fn grid_search_finds_centre() {
        let (energies, data) = synthetic();
        let mut model = peak_model(2.0, 0.08, 1.0);
        let axes = [GridAxis::linspace("peak.centre", 1.2, 1.4, 21)];
        let best = grid_search(&mut model, &energies, &data, None, &axes).unwrap();
        assert!((best.values[0] - 1.30).abs() < 1e-9);
        assert_eq!(best.failed, 0);
        assert!((model.parameter("peak", "centre").unwrap().value - 1.30).abs() < 1e-9);
    }

    #[test]
    fn grid_search_skips_rejected_points() {
        let (energies, data) = synthetic();
        let mut model = peak_model(2.0, 0.08, 1.3);
        let axes = [GridAxis {
            parameter: "peak.fwhm".to_string(),
            values: vec![-0.1, 0.0, 0.08],
        }];
        let best = grid_search(&mut model, &energies, &data, None, &axes).unwrap();
        assert_eq!(best.failed, 2);
        assert_eq!(best.values, vec![0.08]);
        assert!(grid_search(&mut model, &energies, &data, None, &[]).is_err());
    }

    #[test]
    fn exhausted_damping_is_not_convergence() {
        let mut model = Model::new();
        model.add("kink", Box::new(Kink { a: 1.0 })).unwrap();
        let energies = Array1::linspace(1.0, 2.0, 11);
        let data = Array1::zeros(11);
        let options = FitOptions {
            xtol: 0.0,
            ..FitOptions::default()
        };
        let report = levenberg_marquardt(&mut model, &energies, &data, None, &options).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.values, vec![1.0]);
    }
}
