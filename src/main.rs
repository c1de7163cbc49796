use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;

use genplanck::builder::{build_model, energy_grid};
use genplanck::fit::{self, GridAxis};
use genplanck::output;
use genplanck::sample;
use genplanck::settings::{self, CliArgs, Command};

fn parse_scan(scan: &[String]) -> Result<GridAxis> {
    match scan {
        [parameter, start, stop, points] => Ok(GridAxis::linspace(
            parameter.as_str(),
            start.parse().context("scan start")?,
            stop.parse().context("scan stop")?,
            points.parse().context("scan points")?,
        )),
        _ => Err(anyhow!(
            "--scan expects `component.parameter start stop points`, got {:?}",
            scan
        )),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();
    let settings = settings::load_config(&args)?;
    info!("{}", settings);

    let base_dir = args
        .config
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut model = build_model(&settings, &base_dir)?;
    info!("Model:\n{}", model);

    let out = PathBuf::from(&settings.output_dir);
    fs::create_dir_all(&out).with_context(|| format!("creating {:?}", out))?;

    match args.command.clone().unwrap_or(Command::Eval) {
        Command::Eval => {
            let energies = energy_grid(&settings.grid);
            let mut columns = vec![("total".to_string(), model.evaluate_grid(&energies)?)];
            if model.entries().len() > 1 {
                columns.extend(model.component_grids(&energies)?);
            }
            let path = out.join("spectrum.txt");
            output::write_spectrum(&path, &energies, &columns)?;
            info!("Wrote {:?}", path);
        }
        Command::Fit { data, scan } => {
            let (energies, values) = output::read_spectrum(&data)?;
            let grid = match scan {
                Some(scan) => {
                    let axis = parse_scan(&scan)?;
                    Some(fit::grid_search(&mut model, &energies, &values, None, &[axis])?)
                }
                None => None,
            };
            let report = fit::levenberg_marquardt(&mut model, &energies, &values, None, &settings.fit)?;
            info!(
                "Fit {} after {} iterations: chi2 = {:e}, reduced chi2 = {:e}",
                if report.converged { "converged" } else { "stopped" },
                report.iterations,
                report.chi2,
                report.reduced_chi2
            );
            for (name, value) in report.names.iter().zip(&report.values) {
                println!("{:>16} = {:.6}", name, value);
            }

            let fitted = model.evaluate_grid(&energies)?;
            output::write_spectrum(
                out.join("fit.txt"),
                &energies,
                &[("data".to_string(), values), ("fit".to_string(), fitted)],
            )?;
            output::write_report(out.join("fit_report.json"), &data, &report, grid.as_ref())?;
            output::write_parameters(out.join("fit_params.toml"), &model)?;
            info!("Wrote fit results to {:?}", out);
        }
        Command::Simulate { noise, .. } => {
            let energies = energy_grid(&settings.grid);
            let values = sample::synthesize(&model, &energies, noise, settings.seed)?;
            let path = out.join("synthetic.txt");
            output::write_spectrum(&path, &energies, &[("intensity".to_string(), values)])?;
            info!("Wrote {:?}", path);
        }
    }
    Ok(())
}
