use std::path::Path;

use genplanck::builder;
use genplanck::fit::{self, FitOptions};
use genplanck::model::Model;
use genplanck::output;
use genplanck::settings::{self, Settings};
use ndarray::Array1;
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(err: anyhow::Error) -> PyErr {
    PyValueError::new_err(format!("{:#}", err))
}

/// A model built from a configuration file.
#[pyclass(name = "Model")]
struct PyModel {
    model: Model,
    settings: Settings,
}

#[pymethods]
impl PyModel {
    #[new]
    fn new(config: &str) -> PyResult<Self> {
        let path = Path::new(config);
        let settings = settings::load_config_from(path).map_err(to_py_err)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let model = builder::build_model(&settings, base_dir).map_err(to_py_err)?;
        Ok(Self { model, settings })
    }

    /// The configured energy grid in eV.
    fn energies(&self) -> Vec<f64> {
        builder::energy_grid(&self.settings.grid).to_vec()
    }

    /// Model sum at `energies` (the configured grid if omitted).
    #[pyo3(signature = (energies=None))]
    fn evaluate(&self, energies: Option<Vec<f64>>) -> PyResult<Vec<f64>> {
        let energies = match energies {
            Some(e) => Array1::from(e),
            None => builder::energy_grid(&self.settings.grid),
        };
        let values = self.model.evaluate_grid(&energies).map_err(to_py_err)?;
        Ok(values.to_vec())
    }

    fn get(&self, component: &str, parameter: &str) -> PyResult<f64> {
        self.model
            .parameter(component, parameter)
            .map(|p| p.value)
            .ok_or_else(|| PyKeyError::new_err(format!("{}.{}", component, parameter)))
    }

    fn set(&mut self, component: &str, parameter: &str, value: f64) -> PyResult<()> {
        self.model
            .set_parameter(component, parameter, value)
            .map_err(to_py_err)
    }

    /// Fits the free parameters to `(energies, data)` and returns them by name.
    fn fit(&mut self, energies: Vec<f64>, data: Vec<f64>) -> PyResult<Vec<(String, f64)>> {
        let options: FitOptions = self.settings.fit;
        let report = fit::levenberg_marquardt(
            &mut self.model,
            &Array1::from(energies),
            &Array1::from(data),
            None,
            &options,
        )
        .map_err(to_py_err)?;
        Ok(report.names.into_iter().zip(report.values).collect())
    }

    /// Writes the parameters in the configuration-file format.
    fn save_parameters(&self, path: &str) -> PyResult<()> {
        output::write_parameters(path, &self.model).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        self.model.to_string()
    }
}

/// Python bindings for genplanck.
#[pymodule]
fn _genplanck_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    Ok(())
}
