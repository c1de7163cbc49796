//! Assembles a [`Model`] from [`Settings`].
//!
//! Structural sections are built first (refractive indices, reflectances,
//! tails, absorption edges); components then refer to them by name.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::debug;
use ndarray::Array1;
use num_complex::Complex64;

use crate::absorption::IdealSqrtAbsorption;
use crate::component::Component;
use crate::convolution::ConvolutionStrategy;
use crate::lorentzian::LorentzianPeak;
use crate::model::Model;
use crate::output;
use crate::params::Parameter;
use crate::planck::{GeneralizedPlanck, PlanckParams};
use crate::reflectance::Reflectance;
use crate::refr_index::{AxisUnit, ConstantIndex, RefractiveIndex, SellmeierIndex, TabulatedIndex};
use crate::settings::{ComponentSpec, GridSpec, IndexSpec, Settings};
use crate::urbach::UrbachTail;

/// Structural objects shared between components.
#[derive(Debug, Default)]
pub struct Structures {
    pub indices: BTreeMap<String, Arc<dyn RefractiveIndex>>,
    pub reflectances: BTreeMap<String, Arc<Reflectance>>,
    pub tails: BTreeMap<String, Arc<UrbachTail>>,
    pub absorptions: BTreeMap<String, Arc<IdealSqrtAbsorption>>,
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, kind: &str, name: &Option<String>) -> Result<&'a T> {
    let name = name
        .as_deref()
        .ok_or_else(|| anyhow!("missing reference to a [{}] section", kind))?;
    map.get(name)
        .ok_or_else(|| anyhow!("no [{}.{}] section", kind, name))
}

/// Builds one refractive-index source; table files are resolved against `base_dir`.
pub fn build_index(name: &str, spec: &IndexSpec, base_dir: &Path) -> Result<Arc<dyn RefractiveIndex>> {
    let index: Arc<dyn RefractiveIndex> = match (spec.n, &spec.file, &spec.sellmeier) {
        (Some(n), None, None) => Arc::new(ConstantIndex::new(Complex64::new(n, spec.k))?),
        (None, Some(file), None) => {
            let path = base_dir.join(file);
            let rows = output::read_columns(&path)?;
            let units = spec.units.unwrap_or(AxisUnit::Ev);
            Arc::new(TabulatedIndex::from_rows(name, &rows, units)?)
        }
        (None, None, Some(s)) => Arc::new(SellmeierIndex::new(name, s.b.clone(), s.c.clone())?),
        _ => {
            return Err(anyhow!(
                "give exactly one of `n`, `file` or `sellmeier`"
            ))
        }
    };
    Ok(index)
}

/// Builds every structural section of the configuration.
pub fn build_structures(settings: &Settings, base_dir: &Path) -> Result<Structures> {
    let mut s = Structures::default();

    for (name, spec) in &settings.refractive_index {
        let index = build_index(name, spec, base_dir)
            .with_context(|| format!("building [refractive_index.{}]", name))?;
        s.indices.insert(name.clone(), index);
    }

    for (name, spec) in &settings.reflectance {
        let reflectance = (|| -> Result<Reflectance> {
            let n1 = lookup(&s.indices, "refractive_index", &Some(spec.n1.clone()))?;
            let n2 = lookup(&s.indices, "refractive_index", &Some(spec.n2.clone()))?;
            Ok(Reflectance::new(
                spec.theta_deg.to_radians(),
                spec.pol,
                n1.clone(),
                n2.clone(),
            )?)
        })()
        .with_context(|| format!("building [reflectance.{}]", name))?;
        s.reflectances.insert(name.clone(), Arc::new(reflectance));
    }

    for (name, spec) in &settings.tail {
        let tail = UrbachTail::new(spec.g).with_context(|| format!("building [tail.{}]", name))?;
        s.tails.insert(name.clone(), Arc::new(tail));
    }

    for (name, spec) in &settings.absorption {
        let absorption = (|| -> Result<IdealSqrtAbsorption> {
            let ideal = IdealSqrtAbsorption::new(spec.eg, spec.e0, spec.a0)?;
            Ok(match &spec.tail {
                Some(_) => ideal.with_tail(**lookup(&s.tails, "tail", &spec.tail)?),
                None => ideal,
            })
        })()
        .with_context(|| format!("building [absorption.{}]", name))?;
        s.absorptions.insert(name.clone(), Arc::new(absorption));
    }

    Ok(s)
}

fn build_component(
    spec: &ComponentSpec,
    structures: &Structures,
    settings: &Settings,
) -> Result<Box<dyn Component>> {
    let kwargs = &spec.kwargs;
    let component: Box<dyn Component> = match spec.id_name.as_str() {
        "GeneralizedPlanck" => {
            let strategy = if kwargs.analytical.unwrap_or(true) {
                ConvolutionStrategy::Analytical
            } else {
                ConvolutionStrategy::numerical_with(settings.numerical)?
            };
            Box::new(GeneralizedPlanck::new(
                PlanckParams::default(),
                lookup(&structures.reflectances, "reflectance", &kwargs.reflectance)?.clone(),
                lookup(&structures.absorptions, "absorption", &kwargs.absorption)?.clone(),
                lookup(&structures.tails, "tail", &kwargs.tail)?.clone(),
                strategy,
            )?)
        }
        "IdealSqrtAbsorption" => {
            Box::new(**lookup(&structures.absorptions, "absorption", &kwargs.absorption)?)
        }
        "UrbachTail" => Box::new(**lookup(&structures.tails, "tail", &kwargs.tail)?),
        "Reflectance" => Box::new(
            lookup(&structures.reflectances, "reflectance", &kwargs.reflectance)?
                .as_ref()
                .clone(),
        ),
        "Lorentzian" => Box::new(LorentzianPeak::default()),
        other => {
            return Err(anyhow!(
                "unknown id_name '{}', expected one of GeneralizedPlanck, IdealSqrtAbsorption, UrbachTail, Reflectance, Lorentzian",
                other
            ))
        }
    };
    Ok(component)
}

/// Parameter metadata for `component`, in its parameter order.
///
/// Names match case-insensitively. Parameters missing from `spec` are fixed
/// at the component's own value.
fn build_parameters(spec: &ComponentSpec, component: &dyn Component) -> Result<Vec<Parameter>> {
    let names = component.parameter_names();
    if let Some(unknown) = spec
        .parameters
        .keys()
        .find(|k| !names.iter().any(|n| n.eq_ignore_ascii_case(k)))
    {
        return Err(anyhow!(
            "{} has no parameter '{}', expected {:?}",
            spec.id_name,
            unknown,
            names
        ));
    }
    names
        .iter()
        .zip(component.values())
        .map(|(name, current)| -> Result<Parameter> {
            match spec
                .parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
            {
                Some((_, p)) => Ok(p.to_parameter(name)?),
                None => Ok(Parameter::fixed(*name, current)),
            }
        })
        .collect()
}

/// Builds the configured model.
///
/// Every reflectance feeding a component must cover the energy grid.
pub fn build_model(settings: &Settings, base_dir: &Path) -> Result<Model> {
    let structures = build_structures(settings, base_dir)?;
    let range = (settings.grid.start, settings.grid.stop);
    let mut model = Model::new();

    for spec in &settings.components {
        let context = || format!("building component '{}' ({})", spec.name, spec.id_name);
        let component = build_component(spec, &structures, settings).with_context(context)?;
        if let Some(name) = &spec.kwargs.reflectance {
            if let Some(r) = structures.reflectances.get(name) {
                r.check_coverage(range).with_context(context)?;
            }
        }
        let parameters = build_parameters(spec, component.as_ref()).with_context(context)?;
        debug!("{} parameters: {:?}", spec.name, parameters);
        model
            .add_with(spec.name.clone(), component, parameters)
            .with_context(context)?;
    }
    Ok(model)
}

pub fn energy_grid(spec: &GridSpec) -> Array1<f64> {
    Array1::linspace(spec.start, spec.stop, spec.points)
}
