use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use ndarray::Array1;
use serde::Serialize;

use crate::fit::{FitReport, GridResult};
use crate::model::Model;
use crate::params::ParamSpec;

/// Reads whitespace-separated numeric columns, skipping blank lines and `#` comments.
pub fn read_columns(path: impl AsRef<Path>) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    let mut rows = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {:?}", path))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("{:?} line {}: '{}'", path, number + 1, line))?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(anyhow!("{:?} contains no data", path));
    }
    Ok(rows)
}

/// Reads a two-column spectrum `E  y`, sorted by energy.
pub fn read_spectrum(path: impl AsRef<Path>) -> Result<(Array1<f64>, Array1<f64>)> {
    let path = path.as_ref();
    let mut rows = read_columns(path)?;
    if let Some(row) = rows.iter().find(|r| r.len() < 2) {
        return Err(anyhow!("{:?}: expected two columns, found {:?}", path, row));
    }
    rows.sort_by(|a, b| a[0].total_cmp(&b[0]));
    let energies = rows.iter().map(|r| r[0]).collect::<Array1<f64>>();
    let values = rows.iter().map(|r| r[1]).collect::<Array1<f64>>();
    Ok((energies, values))
}

/// Writes `E  col1  col2 ...` with a `#` header naming the columns.
pub fn write_spectrum(
    path: impl AsRef<Path>,
    energies: &Array1<f64>,
    columns: &[(String, Array1<f64>)],
) -> Result<()> {
    let path = path.as_ref();
    if let Some((name, _)) = columns.iter().find(|(_, c)| c.len() != energies.len()) {
        return Err(anyhow!("column '{}' does not match the energy grid", name));
    }
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let mut writer = BufWriter::new(file);

    write!(writer, "# E")?;
    for (name, _) in columns {
        write!(writer, " {}", name)?;
    }
    writeln!(writer)?;

    for (i, e) in energies.iter().enumerate() {
        write!(writer, "{:.6}", e)?;
        for (_, column) in columns {
            write!(writer, " {:.9e}", column[i])?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ReportFile<'a> {
    created: String,
    data: String,
    fit: &'a FitReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid_search: Option<&'a GridResult>,
}

/// Writes a fit report as pretty JSON, stamped with the local time.
pub fn write_report(
    path: impl AsRef<Path>,
    data: &Path,
    report: &FitReport,
    grid_search: Option<&GridResult>,
) -> Result<()> {
    let path = path.as_ref();
    let contents = ReportFile {
        created: Local::now().to_rfc3339(),
        data: data.display().to_string(),
        fit: report,
        grid_search,
    };
    let json = serde_json::to_string_pretty(&contents)?;
    fs::write(path, json).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// Writes every parameter as `[value, lower|false, upper|false, is_free]`,
/// grouped by component, in the format the configuration file reads.
pub fn write_parameters(path: impl AsRef<Path>, model: &Model) -> Result<()> {
    let path = path.as_ref();
    let table: BTreeMap<&str, BTreeMap<&str, ParamSpec>> = model
        .entries()
        .iter()
        .map(|entry| {
            let specs = entry
                .parameters
                .iter()
                .map(|p| (p.name.as_str(), ParamSpec::from(p)))
                .collect();
            (entry.name.as_str(), specs)
        })
        .collect();
    let text = toml::to_string_pretty(&table).context("serializing parameters")?;
    fs::write(path, text).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}
