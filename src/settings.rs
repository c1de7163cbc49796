use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use log::info;
use serde::{Deserialize, Serialize};

use crate::convolution::NumericalSettings;
use crate::fit::FitOptions;
use crate::params::ParamSpec;
use crate::reflectance::Polarization;
use crate::refr_index::AxisUnit;

/// A refractive-index source: a constant, a table file or a Sellmeier formula.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IndexSpec {
    /// Constant real part.
    pub n: Option<f64>,
    /// Constant imaginary part.
    #[serde(default)]
    pub k: f64,
    /// Whitespace-separated columns `x n [k]`.
    pub file: Option<String>,
    /// Abscissa of `file`.
    pub units: Option<AxisUnit>,
    pub sellmeier: Option<SellmeierSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SellmeierSpec {
    pub b: Vec<f64>,
    /// In um^2.
    pub c: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ReflectanceSpec {
    #[serde(default)]
    pub theta_deg: f64,
    pub n1: String,
    pub n2: String,
    #[serde(default = "default_polarization")]
    pub pol: Polarization,
}

fn default_polarization() -> Polarization {
    Polarization::None
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AbsorptionSpec {
    pub eg: f64,
    pub e0: f64,
    pub a0: f64,
    /// Name of a `[tail.<name>]` section to attach.
    pub tail: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TailSpec {
    pub g: f64,
}

/// Evenly spaced photon energies (eV).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct GridSpec {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

/// Structural references of a component, by section name.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ComponentKwargs {
    pub reflectance: Option<String>,
    pub absorption: Option<String>,
    pub tail: Option<String>,
    /// Closed-form convolution for `GeneralizedPlanck`; numerical otherwise.
    pub analytical: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ComponentSpec {
    pub id_name: String,
    pub name: String,
    #[serde(default)]
    pub kwargs: ComponentKwargs,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub refractive_index: BTreeMap<String, IndexSpec>,
    #[serde(default)]
    pub reflectance: BTreeMap<String, ReflectanceSpec>,
    #[serde(default)]
    pub absorption: BTreeMap<String, AbsorptionSpec>,
    #[serde(default)]
    pub tail: BTreeMap<String, TailSpec>,
    #[serde(default)]
    pub numerical: NumericalSettings,
    pub grid: GridSpec,
    #[serde(default)]
    pub fit: FitOptions,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub seed: Option<u64>,
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// Loads `config/local.toml` if present, `config/default.toml` otherwise,
/// then `GENPLANCK_*` environment variables, then the command line.
///
/// An explicit `--config` file replaces the project files.
pub fn load_config(args: &CliArgs) -> Result<Settings> {
    let config_file = match &args.config {
        Some(path) => path.clone(),
        None => {
            let root = retrieve_project_root()?;
            let default_config_file = root.join("config/default.toml");
            let local_config = root.join("config/local.toml");
            if local_config.exists() {
                info!("Using local configuration: {:?}", local_config);
                local_config
            } else {
                info!("Using default configuration: {:?}", default_config_file);
                default_config_file
            }
        }
    };

    let mut config = read_config(&config_file, true)?;
    apply_overrides(&mut config, args)?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads a single configuration file, without environment or CLI overrides.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings> {
    let config = read_config(path.as_ref(), false)?;
    validate_config(&config)?;
    Ok(config)
}

fn read_config(path: &Path, with_env: bool) -> Result<Settings> {
    let mut builder = Config::builder().add_source(File::from(path).required(true));
    if with_env {
        builder = builder.add_source(
            Environment::with_prefix("GENPLANCK")
                .separator("__")
                .try_parsing(true),
        );
    }
    let settings = builder
        .build()
        .with_context(|| format!("loading configuration from {:?}", path))?;
    let config: Settings = settings
        .try_deserialize()
        .with_context(|| format!("deserializing configuration from {:?}", path))?;
    Ok(config)
}

fn parse_grid(grid: &[String]) -> Result<GridSpec> {
    match grid {
        [start, stop, points] => Ok(GridSpec {
            start: start
                .parse()
                .with_context(|| format!("--grid START '{}'", start))?,
            stop: stop
                .parse()
                .with_context(|| format!("--grid STOP '{}'", stop))?,
            points: points
                .parse()
                .with_context(|| format!("--grid POINTS '{}' is not a whole number", points))?,
        }),
        _ => Err(anyhow!("--grid expects `start stop points`, got {:?}", grid)),
    }
}

fn apply_overrides(config: &mut Settings, args: &CliArgs) -> Result<()> {
    if let Some(grid) = &args.grid {
        config.grid = parse_grid(grid)?;
    }
    if args.numerical {
        for component in config.components.iter_mut() {
            component.kwargs.analytical = Some(false);
        }
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(Command::Simulate { seed: Some(seed), .. }) = &args.command {
        config.seed = Some(*seed);
    }
    Ok(())
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the GENPLANCK_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("GENPLANCK_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }
    let exe_path = env::current_exe().context("locating the current executable")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("could not find a project root with a config/ directory"))
}

fn validate_config(config: &Settings) -> Result<()> {
    let grid = &config.grid;
    if grid.points < 2 {
        return Err(anyhow!("grid needs at least 2 points, got {}", grid.points));
    }
    if !(grid.start > 0.0 && grid.stop > grid.start) {
        return Err(anyhow!(
            "grid must satisfy 0 < start < stop, got [{}, {}]",
            grid.start,
            grid.stop
        ));
    }
    if config.components.is_empty() {
        return Err(anyhow!("no [[components]] configured"));
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "genplanck - generalized Planck emission of semiconductors")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file to use instead of config/default.toml or config/local.toml.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Energy grid in eV as `start stop points`.
    #[arg(long, num_args = 3, value_names = ["START", "STOP", "POINTS"], allow_negative_numbers = true, global = true)]
    pub grid: Option<Vec<String>>,

    /// Evaluate every convolution numerically instead of in closed form.
    #[arg(long, global = true)]
    pub numerical: bool,

    /// Directory for output files.
    #[arg(short, long, global = true)]
    pub output: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Evaluate the configured model on the energy grid.
    Eval,
    /// Fit the configured model to a measured spectrum.
    Fit {
        /// Two-column file: energy (eV) and intensity.
        #[arg(short, long)]
        data: PathBuf,
        /// Scan a parameter before fitting, as `component.parameter start stop points`.
        #[arg(long, num_args = 4, value_names = ["PARAMETER", "START", "STOP", "POINTS"])]
        scan: Option<Vec<String>>,
    },
    /// Write a synthetic spectrum of the configured model.
    Simulate {
        /// Gaussian noise, standard deviation relative to the peak.
        #[arg(long)]
        noise: Option<f64>,
        /// Random seed for the noise.
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Grid: {} to {} eV, {} points
  - Refractive indices: {:?}
  - Components: {:?}
  - Quadrature: N = {}, order {}, {} panels
  - Output: {}
  ",
            self.grid.start,
            self.grid.stop,
            self.grid.points,
            self.refractive_index.keys().collect::<Vec<_>>(),
            self.components
                .iter()
                .map(|c| format!("{} ({})", c.name, c.id_name))
                .collect::<Vec<_>>(),
            self.numerical.width_factor,
            self.numerical.order,
            self.numerical.panels,
            self.output_dir,
        )
    }
}
