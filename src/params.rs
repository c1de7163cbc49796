//! Named, boundable model parameters.
//!
//! A parameter is written in configuration files as a four-element array
//! `[initial, lower, upper, is_free]`, where either bound may be `false` to
//! leave that side open:
//!
//! ```toml
//! Eg = [1.39, 1.3, 1.5, true]
//! d  = [150, false, false, false]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A single model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    /// `(lower, upper)`; an open side is infinite.
    pub bound: Option<(f64, f64)>,
    /// Whether a fit may vary the parameter.
    pub free: bool,
}

impl Parameter {
    /// Free, unbounded parameter.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            bound: None,
            free: true,
        }
    }

    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            free: false,
            ..Self::new(name, value)
        }
    }

    /// Sets the bounds; `None` on both sides removes them.
    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Result<Self> {
        self.bound = match (lower, upper) {
            (None, None) => None,
            (lower, upper) => {
                let lo = lower.unwrap_or(f64::NEG_INFINITY);
                let hi = upper.unwrap_or(f64::INFINITY);
                if lo.is_nan() || hi.is_nan() || lo > hi {
                    return Err(ModelError::invalid(
                        &self.name,
                        self.value,
                        format!("malformed bounds ({}, {})", lo, hi),
                    ));
                }
                Some((lo, hi))
            }
        };
        Ok(self)
    }

    pub fn lower(&self) -> f64 {
        self.bound.map_or(f64::NEG_INFINITY, |b| b.0)
    }

    pub fn upper(&self) -> f64 {
        self.bound.map_or(f64::INFINITY, |b| b.1)
    }

    /// `value` projected onto the bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        match self.bound {
            Some((lo, hi)) => value.clamp(lo, hi),
            None => value,
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        self.value >= self.lower() && self.value <= self.upper()
    }
}

/// One side of a bound as written in a configuration file: a number or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundValue {
    Limit(f64),
    Open(bool),
}

impl BoundValue {
    fn limit(&self, name: &str, side: &str) -> Result<Option<f64>> {
        match *self {
            BoundValue::Limit(v) => Ok(Some(v)),
            BoundValue::Open(false) => Ok(None),
            BoundValue::Open(true) => Err(ModelError::invalid(
                name,
                f64::NAN,
                format!("{} bound must be a number or false, got true", side),
            )),
        }
    }

    fn from_limit(value: f64) -> Self {
        if value.is_finite() {
            BoundValue::Limit(value)
        } else {
            BoundValue::Open(false)
        }
    }
}

/// `[initial, lower|false, upper|false, is_free]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec(pub f64, pub BoundValue, pub BoundValue, pub bool);

impl ParamSpec {
    pub fn to_parameter(&self, name: &str) -> Result<Parameter> {
        let lower = self.1.limit(name, "lower")?;
        let upper = self.2.limit(name, "upper")?;
        let parameter = Parameter {
            free: self.3,
            ..Parameter::new(name, self.0)
        }
        .with_bounds(lower, upper)?;
        if !parameter.is_within_bounds() {
            return Err(ModelError::invalid(
                name,
                self.0,
                format!(
                    "initial value outside bounds ({}, {})",
                    parameter.lower(),
                    parameter.upper()
                ),
            ));
        }
        Ok(parameter)
    }
}

impl From<&Parameter> for ParamSpec {
    fn from(parameter: &Parameter) -> Self {
        ParamSpec(
            parameter.value,
            BoundValue::from_limit(parameter.lower()),
            BoundValue::from_limit(parameter.upper()),
            parameter.free,
        )
    }
}
