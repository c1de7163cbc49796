//! Refractive-index sources.
//!
//! A [`RefractiveIndex`] maps photon energy (eV) to a complex index
//! `n + ik`. Sources are loaded once, before any evaluation, and shared
//! read-only between reflectance models through `Arc<dyn RefractiveIndex>`.
//!
//! | Source | Type |
//! |--------|------|
//! | constant value | [`ConstantIndex`] |
//! | tabulated (E or wavelength, n, k) | [`TabulatedIndex`] |
//! | Sellmeier dispersion formula | [`SellmeierIndex`] |

use std::fmt;

use itertools::Itertools;
use num_complex::Complex64;

use crate::config::EV_UM;
use crate::error::{ModelError, Result};
use crate::spline::CubicSpline;

/// Energy-dependent complex refractive index.
pub trait RefractiveIndex: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Energy range (eV) over which the index is defined; `None` means everywhere.
    fn extent(&self) -> Option<(f64, f64)>;

    /// Complex index at photon energy `e` (eV).
    fn index_at(&self, e: f64) -> Result<Complex64>;
}

/// Abscissa unit of a tabulated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisUnit {
    /// Photon energy in eV.
    Ev,
    /// Vacuum wavelength in micrometres.
    Um,
}

/// Same index at every energy.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantIndex {
    name: String,
    value: Complex64,
}

impl ConstantIndex {
    pub fn new(value: Complex64) -> Result<Self> {
        if !value.re.is_finite() || !value.im.is_finite() {
            return Err(ModelError::invalid("n", value.re, "index must be finite"));
        }
        Ok(Self {
            name: format!("n = {}", value),
            value,
        })
    }

    pub fn real(n: f64) -> Result<Self> {
        Self::new(Complex64::new(n, 0.0))
    }
}

impl RefractiveIndex for ConstantIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn extent(&self) -> Option<(f64, f64)> {
        None
    }

    fn index_at(&self, _e: f64) -> Result<Complex64> {
        Ok(self.value)
    }
}

/// Tabulated `n` and `k`, spline-interpolated over energy.
///
/// Tables given against wavelength are converted with `E = 1.23984 / lambda`
/// and re-sorted by energy. No extrapolation: energies outside the table fail
/// with a domain error.
#[derive(Debug, Clone)]
pub struct TabulatedIndex {
    name: String,
    n: CubicSpline,
    k: CubicSpline,
}

impl TabulatedIndex {
    pub fn new(
        name: impl Into<String>,
        axis: &[f64],
        unit: AxisUnit,
        n: &[f64],
        k: &[f64],
    ) -> Result<Self> {
        if axis.len() != n.len() || axis.len() != k.len() {
            return Err(ModelError::invalid(
                "table",
                axis.len() as f64,
                format!(
                    "column lengths differ: axis {}, n {}, k {}",
                    axis.len(),
                    n.len(),
                    k.len()
                ),
            ));
        }
        if let Some(&bad) = axis.iter().find(|x| !x.is_finite() || **x <= 0.0) {
            return Err(ModelError::invalid("table", bad, "axis values must be positive"));
        }

        let rows: Vec<(f64, f64, f64)> = axis
            .iter()
            .zip(n.iter().zip(k.iter()))
            .map(|(&x, (&n, &k))| match unit {
                AxisUnit::Ev => (x, n, k),
                AxisUnit::Um => (EV_UM / x, n, k),
            })
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .collect();

        let energies: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let n_spline = CubicSpline::new(energies.clone(), rows.iter().map(|r| r.1).collect())?;
        let k_spline = CubicSpline::new(energies, rows.iter().map(|r| r.2).collect())?;

        Ok(Self {
            name: name.into(),
            n: n_spline,
            k: k_spline,
        })
    }

    /// Builds from rows `[axis, n]` or `[axis, n, k]` (missing `k` is zero).
    pub fn from_rows(name: impl Into<String>, rows: &[Vec<f64>], unit: AxisUnit) -> Result<Self> {
        let mut axis = Vec::with_capacity(rows.len());
        let mut n = Vec::with_capacity(rows.len());
        let mut k = Vec::with_capacity(rows.len());
        for row in rows {
            match row.as_slice() {
                [x, nv] => {
                    axis.push(*x);
                    n.push(*nv);
                    k.push(0.0);
                }
                [x, nv, kv, ..] => {
                    axis.push(*x);
                    n.push(*nv);
                    k.push(*kv);
                }
                _ => {
                    return Err(ModelError::invalid(
                        "table",
                        row.len() as f64,
                        "rows need at least two columns",
                    ))
                }
            }
        }
        Self::new(name, &axis, unit, &n, &k)
    }
}

impl RefractiveIndex for TabulatedIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn extent(&self) -> Option<(f64, f64)> {
        Some(self.n.extent())
    }

    fn index_at(&self, e: f64) -> Result<Complex64> {
        let (min, max) = self.n.extent();
        if !(min..=max).contains(&e) {
            return Err(ModelError::domain(
                e,
                format!("{} is tabulated on [{}, {}] eV only", self.name, min, max),
            ));
        }
        Ok(Complex64::new(self.n.evaluate(e), self.k.evaluate(e)))
    }
}

/// Sellmeier dispersion `n^2 = 1 + sum B_i lambda^2 / (lambda^2 - C_i)`, lambda in um.
#[derive(Debug, Clone, PartialEq)]
pub struct SellmeierIndex {
    name: String,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl SellmeierIndex {
    pub fn new(name: impl Into<String>, b: Vec<f64>, c: Vec<f64>) -> Result<Self> {
        if b.len() != c.len() || b.is_empty() {
            return Err(ModelError::invalid(
                "sellmeier",
                b.len() as f64,
                "B and C need the same, non-zero number of terms",
            ));
        }
        if let Some(&bad) = b.iter().chain(c.iter()).find(|v| !v.is_finite()) {
            return Err(ModelError::invalid("sellmeier", bad, "coefficients must be finite"));
        }
        if let Some(&bad) = c.iter().find(|v| **v < 0.0) {
            return Err(ModelError::invalid("sellmeier", bad, "C coefficients must be >= 0"));
        }
        Ok(Self {
            name: name.into(),
            b,
            c,
        })
    }
}

impl RefractiveIndex for SellmeierIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn extent(&self) -> Option<(f64, f64)> {
        None
    }

    fn index_at(&self, e: f64) -> Result<Complex64> {
        if !e.is_finite() || e <= 0.0 {
            return Err(ModelError::domain(e, "photon energy must be positive"));
        }
        let l2 = (EV_UM / e).powi(2);
        let n2 = 1.0
            + self
                .b
                .iter()
                .zip(self.c.iter())
                .map(|(b, c)| b * l2 / (l2 - c))
                .sum::<f64>();
        if !n2.is_finite() || n2 <= 0.0 {
            return Err(ModelError::domain(
                e,
                format!("{} is outside its transparent range", self.name),
            ));
        }
        Ok(Complex64::new(n2.sqrt(), 0.0))
    }
}

/// Whether an index defined on `extent` covers the energy range `reference`.
///
/// A `None` extent covers everything. Either range with `min >= max` is an
/// `InvalidParameter` error.
pub fn compare_extent(extent: Option<(f64, f64)>, reference: (f64, f64)) -> Result<bool> {
    if !(reference.1 > reference.0) {
        return Err(ModelError::invalid(
            "range",
            reference.0,
            format!("expected (min, max) with min < max, got {:?}", reference),
        ));
    }
    match extent {
        None => Ok(true),
        Some((lo, hi)) if hi > lo => Ok(lo <= reference.0 && hi >= reference.1),
        Some(bad) => Err(ModelError::invalid(
            "extent",
            bad.0,
            format!("expected (min, max) with min < max, got {:?}", bad),
        )),
    }
}
