use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use testlog_analyzer::data::filter::select_only;
use testlog_analyzer::data::loader::{load_config, load_file, load_polygons, load_specs};
use testlog_analyzer::data::model::CellValue;
use testlog_analyzer::report::{render_text, write_json, write_results_csv};
use testlog_analyzer::{AnalysisConfig, AnalysisSession, RegionSet};

/// Judge a test log against acceptance limits and report yield, top defects and Cpk.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Test log (.csv, .json or .parquet)
    dataset: PathBuf,
    /// Spec set JSON: { "White": { "L": [lower, upper], ... }, "Mixed": { ... } }
    #[arg(long)]
    specs: PathBuf,
    /// Region polygons JSON: { "White": [[u, v], ...], "Mixed": [...] }
    #[arg(long)]
    polygons: Option<PathBuf>,
    /// Analysis config JSON (partial files are fine)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Column to break yield and defect tables down by
    #[arg(long)]
    group: Option<String>,
    /// Restrict the run to records where COLUMN equals VALUE (repeatable;
    /// repeated columns accumulate values)
    #[arg(long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<String>,
    /// Write the full report as JSON
    #[arg(long)]
    json_out: Option<PathBuf>,
    /// Write per-row verdicts as CSV
    #[arg(long)]
    csv_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let dataset = load_file(&args.dataset)
        .with_context(|| format!("loading {}", args.dataset.display()))?;
    let specs = load_specs(&args.specs)?;
    let polygons = match &args.polygons {
        Some(p) => load_polygons(p)?,
        None => RegionSet::new(),
    };
    let mut config = match &args.config {
        Some(p) => load_config(p)?,
        None => AnalysisConfig::default(),
    };
    if args.group.is_some() {
        config.group_column = args.group.clone();
    }

    let mut session = AnalysisSession::new(dataset, specs, polygons, config);

    let mut selections: Vec<(String, Vec<CellValue>)> = Vec::new();
    for f in &args.filters {
        let Some((column, value)) = f.split_once('=') else {
            bail!("--filter expects COLUMN=VALUE, got {f:?}");
        };
        let Some(known) = session.dataset.unique_values.get(column) else {
            bail!("--filter: unknown column {column:?}");
        };
        // Match against the typed cell values by their display form.
        let values: Vec<CellValue> = known
            .iter()
            .filter(|v| v.to_string() == value)
            .cloned()
            .collect();
        match selections.iter_mut().find(|(c, _)| c == column) {
            Some((_, acc)) => acc.extend(values),
            None => selections.push((column.to_string(), values)),
        }
    }
    for (column, values) in selections {
        select_only(&mut session.filters, &column, values);
    }

    let report = session.run();
    print!("{}", render_text(&report));

    if let Some(path) = &args.json_out {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_json(&report, &mut out)?;
        out.flush().with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.csv_out {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_results_csv(&session.dataset, &report.results, &mut out)?;
        out.flush().with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
