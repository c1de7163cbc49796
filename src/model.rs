//! A sum of named components with fit metadata for every parameter.

use std::fmt;

use anyhow::{anyhow, Context, Result};
use ndarray::Array1;
use rayon::prelude::*;

use crate::component::Component;
use crate::params::Parameter;

/// One named component and the metadata of its parameters.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub name: String,
    pub component: Box<dyn Component>,
    pub parameters: Vec<Parameter>,
}

/// `f(E) = sum_i f_i(E)` over an ordered list of components.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entries: Vec<ModelEntry>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component whose parameters are all free and unbounded.
    pub fn add(&mut self, name: impl Into<String>, component: Box<dyn Component>) -> Result<()> {
        let parameters = component
            .parameter_names()
            .iter()
            .zip(component.values())
            .map(|(n, v)| Parameter::new(*n, v))
            .collect();
        self.add_with(name, component, parameters)
    }

    /// Adds a component with explicit parameter metadata, one per parameter
    /// name in order. The component takes the metadata values.
    pub fn add_with(
        &mut self,
        name: impl Into<String>,
        mut component: Box<dyn Component>,
        parameters: Vec<Parameter>,
    ) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(anyhow!("duplicate component name '{}'", name));
        }
        let expected = component.parameter_names();
        let given: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
        if expected != given.as_slice() {
            return Err(anyhow!(
                "component '{}' ({}) expects parameters {:?}, got {:?}",
                name,
                component.kind(),
                expected,
                given
            ));
        }
        let values: Vec<f64> = parameters.iter().map(|p| p.value).collect();
        component
            .set_values(&values)
            .with_context(|| format!("initialising component '{}' with {:?}", name, values))?;
        self.entries.push(ModelEntry {
            name,
            component,
            parameters,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn component(&self, name: &str) -> Option<&dyn Component> {
        self.entry(name).map(|e| e.component.as_ref())
    }

    fn entry(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn parameter(&self, component: &str, parameter: &str) -> Option<&Parameter> {
        self.entry(component)?
            .parameters
            .iter()
            .find(|p| p.name == parameter)
    }

    /// Sets one parameter value, keeping the component in sync.
    ///
    /// Values outside the parameter's bounds are rejected.
    pub fn set_parameter(&mut self, component: &str, parameter: &str, value: f64) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == component)
            .ok_or_else(|| anyhow!("no component named '{}'", component))?;
        let index = entry
            .parameters
            .iter()
            .position(|p| p.name == parameter)
            .ok_or_else(|| anyhow!("component '{}' has no parameter '{}'", component, parameter))?;
        let p = &entry.parameters[index];
        if !(value >= p.lower() && value <= p.upper()) {
            return Err(anyhow!(
                "{}.{} = {} is outside [{}, {}]",
                component,
                parameter,
                value,
                p.lower(),
                p.upper()
            ));
        }
        let mut values = entry.component.values();
        values[index] = value;
        entry
            .component
            .set_values(&values)
            .with_context(|| format!("setting {}.{} = {}", component, parameter, value))?;
        entry.parameters[index].value = value;
        Ok(())
    }

    /// Marks a parameter free or fixed.
    pub fn set_free(&mut self, component: &str, parameter: &str, free: bool) -> Result<()> {
        let p = self
            .entries
            .iter_mut()
            .find(|e| e.name == component)
            .and_then(|e| e.parameters.iter_mut().find(|p| p.name == parameter))
            .ok_or_else(|| anyhow!("no parameter {}.{}", component, parameter))?;
        p.free = free;
        Ok(())
    }

    fn free_parameters(&self) -> impl Iterator<Item = (&ModelEntry, &Parameter)> {
        self.entries
            .iter()
            .flat_map(|e| e.parameters.iter().map(move |p| (e, p)))
            .filter(|(_, p)| p.free)
    }

    /// Qualified names `component.parameter` of the free parameters.
    pub fn free_names(&self) -> Vec<String> {
        self.free_parameters()
            .map(|(e, p)| format!("{}.{}", e.name, p.name))
            .collect()
    }

    pub fn free_values(&self) -> Vec<f64> {
        self.free_parameters().map(|(_, p)| p.value).collect()
    }

    pub fn free_bounds(&self) -> Vec<(f64, f64)> {
        self.free_parameters()
            .map(|(_, p)| (p.lower(), p.upper()))
            .collect()
    }

    /// Projects a free-parameter vector onto the bounds.
    pub fn clamp_free(&self, values: &[f64]) -> Vec<f64> {
        self.free_parameters()
            .zip(values)
            .map(|((_, p), v)| p.clamp(*v))
            .collect()
    }

    /// Sets all free parameters at once, clamped to their bounds.
    ///
    /// Either every component accepts its new values or the model is left
    /// unchanged.
    pub fn set_free_values(&mut self, values: &[f64]) -> Result<()> {
        let n_free = self.free_parameters().count();
        if values.len() != n_free {
            return Err(anyhow!(
                "expected {} free parameter values, got {}",
                n_free,
                values.len()
            ));
        }
        let clamped = self.clamp_free(values);

        let mut next = clamped.iter();
        let mut staged = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut params = entry.parameters.clone();
            for p in params.iter_mut().filter(|p| p.free) {
                if let Some(v) = next.next() {
                    p.value = *v;
                }
            }
            let vals: Vec<f64> = params.iter().map(|p| p.value).collect();
            let mut component = entry.component.boxed_clone();
            component
                .set_values(&vals)
                .with_context(|| format!("component '{}' rejected {:?}", entry.name, vals))?;
            staged.push((component, params));
        }

        for (entry, (component, params)) in self.entries.iter_mut().zip(staged) {
            entry.component = component;
            entry.parameters = params;
        }
        Ok(())
    }

    pub fn evaluate(&self, e: f64) -> Result<f64> {
        self.entries.iter().try_fold(0.0, |acc, entry| -> Result<f64> {
            let v = entry
                .component
                .evaluate(e)
                .with_context(|| format!("evaluating '{}' at E = {}", entry.name, e))?;
            Ok(acc + v)
        })
    }

    /// Each component over the grid, components evaluated in parallel.
    pub fn component_grids(&self, energies: &Array1<f64>) -> Result<Vec<(String, Array1<f64>)>> {
        self.entries
            .par_iter()
            .map(|entry| -> Result<(String, Array1<f64>)> {
                let values = entry
                    .component
                    .evaluate_grid(energies)
                    .with_context(|| format!("evaluating '{}' on the grid", entry.name))?;
                Ok((entry.name.clone(), values))
            })
            .collect()
    }

    pub fn evaluate_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        let grids = self.component_grids(energies)?;
        Ok(grids
            .into_iter()
            .fold(Array1::zeros(energies.len()), |acc, (_, g)| acc + g))
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{} ({})", entry.name, entry.component.kind())?;
            for p in &entry.parameters {
                let state = if p.free { "free" } else { "fixed" };
                match p.bound {
                    Some((lo, hi)) => {
                        writeln!(f, "  - {}: {:.6} [{}, {}] {}", p.name, p.value, lo, hi, state)?
                    }
                    None => writeln!(f, "  - {}: {:.6} {}", p.name, p.value, state)?,
                }
            }
        }
        Ok(())
    }
}
