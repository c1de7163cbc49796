//! Uniform interface over the model components so they can be summed and fit.

use std::fmt;

use ndarray::Array1;

use crate::absorption::IdealSqrtAbsorption;
use crate::error::{ModelError, Result};
use crate::lorentzian::LorentzianPeak;
use crate::planck::{GeneralizedPlanck, PlanckParams};
use crate::reflectance::Reflectance;
use crate::urbach::UrbachTail;

/// A fittable curve `f(E; params)`.
///
/// Parameters are exchanged as plain vectors in the order given by
/// [`Component::parameter_names`].
pub trait Component: Send + Sync + fmt::Debug {
    /// Type name as used by `id_name` in configuration files.
    fn kind(&self) -> &'static str;

    fn parameter_names(&self) -> &'static [&'static str];

    fn values(&self) -> Vec<f64>;

    /// Replaces all parameter values; the component is unchanged on error.
    fn set_values(&mut self, values: &[f64]) -> Result<()>;

    fn evaluate(&self, e: f64) -> Result<f64>;

    fn evaluate_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        let values = energies
            .iter()
            .map(|&e| self.evaluate(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array1::from(values))
    }

    fn boxed_clone(&self) -> Box<dyn Component>;
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

fn expect_len(kind: &str, values: &[f64], n: usize) -> Result<()> {
    if values.len() != n {
        return Err(ModelError::invalid(
            kind,
            values.len() as f64,
            format!("expected {} parameter values, got {}", n, values.len()),
        ));
    }
    Ok(())
}

impl Component for GeneralizedPlanck {
    fn kind(&self) -> &'static str {
        "GeneralizedPlanck"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["Eg", "g", "p", "T", "d", "Efv", "Efc"]
    }

    fn values(&self) -> Vec<f64> {
        let p = self.params();
        vec![p.eg, p.g, p.p, p.t, p.d, p.efv, p.efc]
    }

    fn set_values(&mut self, values: &[f64]) -> Result<()> {
        expect_len(self.kind(), values, 7)?;
        let params = PlanckParams {
            eg: values[0],
            g: values[1],
            p: values[2],
            t: values[3],
            d: values[4],
            efv: values[5],
            efc: values[6],
        };
        params.validate()?;
        self.set_params(params);
        Ok(())
    }

    fn evaluate(&self, e: f64) -> Result<f64> {
        self.emission(e)
    }

    fn evaluate_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        self.emission_grid(energies)
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

impl Component for IdealSqrtAbsorption {
    fn kind(&self) -> &'static str {
        "IdealSqrtAbsorption"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["Eg", "a0", "E0"]
    }

    fn values(&self) -> Vec<f64> {
        vec![self.eg(), self.a0(), self.e0()]
    }

    fn set_values(&mut self, values: &[f64]) -> Result<()> {
        expect_len(self.kind(), values, 3)?;
        let updated = IdealSqrtAbsorption::new(values[0], values[2], values[1])?;
        *self = match self.tail() {
            Some(tail) => updated.with_tail(*tail),
            None => updated,
        };
        Ok(())
    }

    fn evaluate(&self, e: f64) -> Result<f64> {
        Ok(IdealSqrtAbsorption::evaluate(self, e))
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(*self)
    }
}

impl Component for UrbachTail {
    fn kind(&self) -> &'static str {
        "UrbachTail"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["g"]
    }

    fn values(&self) -> Vec<f64> {
        vec![self.width()]
    }

    fn set_values(&mut self, values: &[f64]) -> Result<()> {
        expect_len(self.kind(), values, 1)?;
        *self = self.with_width(values[0])?;
        Ok(())
    }

    fn evaluate(&self, e: f64) -> Result<f64> {
        Ok(self.value(e))
    }

    fn evaluate_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.value_grid(energies))
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(*self)
    }
}

impl Component for Reflectance {
    fn kind(&self) -> &'static str {
        "Reflectance"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["theta"]
    }

    fn values(&self) -> Vec<f64> {
        vec![self.theta()]
    }

    fn set_values(&mut self, values: &[f64]) -> Result<()> {
        expect_len(self.kind(), values, 1)?;
        self.set_theta(values[0])
    }

    fn evaluate(&self, e: f64) -> Result<f64> {
        self.reflectance(e)
    }

    fn evaluate_grid(&self, energies: &Array1<f64>) -> Result<Array1<f64>> {
        self.reflectance_grid(energies)
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

impl Component for LorentzianPeak {
    fn kind(&self) -> &'static str {
        "Lorentzian"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["height", "fwhm", "centre"]
    }

    fn values(&self) -> Vec<f64> {
        vec![self.height(), self.fwhm(), self.centre()]
    }

    fn set_values(&mut self, values: &[f64]) -> Result<()> {
        expect_len(self.kind(), values, 3)?;
        *self = LorentzianPeak::new(values[0], values[1], values[2])?;
        Ok(())
    }

    fn evaluate(&self, e: f64) -> Result<f64> {
        Ok(self.value(e))
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_through_components() {
        let mut components: Vec<Box<dyn Component>> = vec![
            Box::new(IdealSqrtAbsorption::default().with_tail(UrbachTail::default())),
            Box::new(UrbachTail::default()),
            Box::new(LorentzianPeak::new(1.0, 0.05, 1.3).unwrap()),
        ];
        for component in components.iter_mut() {
            let values = component.values();
            assert_eq!(values.len(), component.parameter_names().len());
            component.set_values(&values).unwrap();
            assert_eq!(component.values(), values);
        }
    }

    #[test]
    fn failed_update_leaves_component_untouched() {
        let mut ideal: Box<dyn Component> = Box::new(IdealSqrtAbsorption::default());
        // E0 == Eg
        assert!(ideal.set_values(&[1.6, 14800.0, 1.6]).is_err());
        assert_eq!(ideal.values(), vec![1.42, 14800.0, 1.6]);
        assert!(ideal.set_values(&[1.42]).is_err());
    }

    #[test]
    fn tailed_absorption_evaluates_broadened_edge() {
        let ideal: Box<dyn Component> =
            Box::new(IdealSqrtAbsorption::default().with_tail(UrbachTail::default()));
        assert!(ideal.evaluate(1.40).unwrap() > 0.0);
        let copy = ideal.clone();
        assert_eq!(copy.kind(), "IdealSqrtAbsorption");
    }

    #[test]
    fn tail_grid_matches_pointwise_kernel() {
        let tail: Box<dyn Component> = Box::new(UrbachTail::new(0.02).unwrap());
        let energies = Array1::linspace(-0.1, 0.1, 41);
        let grid = tail.evaluate_grid(&energies).unwrap();
        for (e, v) in energies.iter().zip(grid.iter()) {
            assert_eq!(*v, tail.evaluate(*e).unwrap());
        }
    }
}
