//! Error taxonomy for model evaluation.
//!
//! Every model component reports failures through [`ModelError`]. Errors are
//! raised at the call that detects them and are never replaced by a default
//! value; the fitting and configuration layers attach the offending
//! parameter values on top with `anyhow` context.

use thiserror::Error;

/// Errors raised by the model components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Malformed structural or physical input, e.g. `E0 == Eg`.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },

    /// Unrecognised polarization selector.
    #[error("invalid polarization '{0}', expected one of: s, p, unpolarized, none")]
    InvalidPolarization(String),

    /// Analytical convolution requested for a pair without a closed form.
    #[error("no closed-form convolution of {absorption} with {kernel}; use the numerical strategy")]
    UnsupportedCombination { absorption: String, kernel: String },

    /// Evaluation is undefined at this energy.
    #[error("domain error at E = {energy} eV: {reason}")]
    Domain { energy: f64, reason: String },
}

impl ModelError {
    pub fn invalid(name: impl Into<String>, value: f64, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name: name.into(),
            value,
            reason: reason.into(),
        }
    }

    pub fn domain(energy: f64, reason: impl Into<String>) -> Self {
        ModelError::Domain {
            energy,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Checks that a parameter is finite and strictly positive.
pub(crate) fn require_positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ModelError::invalid(name, value, "must be finite and > 0"));
    }
    Ok(value)
}

/// Checks that a parameter is finite.
pub(crate) fn require_finite(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(ModelError::invalid(name, value, "must be finite"));
    }
    Ok(value)
}
