//! Analysis report and its export forms (JSON, per-row CSV, text tables).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::capability::CpkResult;
use crate::data::model::Dataset;
use crate::evaluate::EvaluationResult;
use crate::matching::{Binding, ColumnMatch};
use crate::spec::WindowType;
use crate::stats::{AggregateTables, DefectRow, YieldRow};

/// How one spec was bound for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingSummary {
    pub window_type: WindowType,
    pub standard_type: String,
    pub column: Option<String>,
    pub score: i32,
}

impl BindingSummary {
    pub fn from_binding(b: &Binding) -> Self {
        BindingSummary {
            window_type: b.spec.window_type,
            standard_type: b.spec.standard_type.clone(),
            column: Some(b.column_name.clone()),
            score: b.score,
        }
    }

    pub fn from_unmatched(m: &ColumnMatch) -> Self {
        BindingSummary {
            window_type: m.window_type,
            standard_type: m.standard_type.clone(),
            column: None,
            score: m.confidence_score,
        }
    }
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub total_records: usize,
    pub selected_records: usize,
    pub cancelled: bool,
    pub error_count: usize,
    pub bindings: Vec<BindingSummary>,
    pub results: Vec<EvaluationResult>,
    pub cpk: BTreeMap<WindowType, Vec<CpkResult>>,
    pub tables: AggregateTables,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Pretty-printed JSON of the whole report.
pub fn write_json<W: Write>(report: &AnalysisReport, out: W) -> Result<()> {
    serde_json::to_writer_pretty(out, report).context("writing report JSON")
}

/// One CSV line per evaluated record: row, verdict, failures, emphasized columns.
pub fn write_results_csv<W: Write>(dataset: &Dataset, results: &[EvaluationResult], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["row_index", "verdict", "failures", "highlighted_columns"])
        .context("writing CSV header")?;
    for r in results {
        let highlighted: Vec<&str> = r
            .highlighted_cells
            .iter()
            .filter_map(|&i| dataset.column_names.get(i).map(String::as_str))
            .collect();
        writer
            .write_record([
                r.row_index.to_string(),
                if r.pass { "PASS" } else { "FAIL" }.to_string(),
                r.failed_descriptions.join("; "),
                highlighted.join("; "),
            ])
            .with_context(|| format!("writing CSV row {}", r.row_index))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn opt(v: Option<f64>, digits: usize) -> String {
    match v {
        Some(x) => format!("{x:.digits$}"),
        None => "N/A".to_string(),
    }
}

fn limit(v: f64) -> String {
    if v.is_finite() {
        format!("{v}")
    } else {
        "-".to_string()
    }
}

fn yield_line(out: &mut String, row: &YieldRow) {
    let _ = writeln!(
        out,
        "{:<20} {:>7} {:>7} {:>7} {:>9.2}%",
        row.group, row.total, row.pass_count, row.fail_count, row.fail_rate
    );
}

fn defect_lines(out: &mut String, rows: &[DefectRow]) {
    for (rank, d) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:<28} {:>6} {:>9.2}%",
            rank + 1,
            d.label,
            d.fail_count,
            d.fail_rate
        );
    }
}

/// Plain-text tables for terminal output.
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Records: {} selected of {}{}",
        report.selected_records,
        report.total_records,
        if report.cancelled { " (run cancelled)" } else { "" }
    );
    if report.error_count > 0 {
        let _ = writeln!(out, "Rows with evaluation errors: {}", report.error_count);
    }

    let _ = writeln!(out, "\n== Yield ==");
    let _ = writeln!(
        out,
        "{:<20} {:>7} {:>7} {:>7} {:>10}",
        "Group", "Total", "Pass", "Fail", "Fail rate"
    );
    yield_line(&mut out, &report.tables.global);
    for g in &report.tables.groups {
        yield_line(&mut out, g);
    }

    let _ = writeln!(out, "\n== Top defects ==");
    if report.tables.top_defects.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    defect_lines(&mut out, &report.tables.top_defects);
    for g in &report.tables.group_defects {
        if g.defects.is_empty() {
            continue;
        }
        let _ = writeln!(out, "-- {} --", g.group);
        defect_lines(&mut out, &g.defects);
    }

    for (window, rows) in &report.cpk {
        if rows.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n== Cpk ({window}) ==");
        let _ = writeln!(
            out,
            "{:<24} {:>9} {:>9} {:>10} {:>9} {:>7} {:>6} {:>6} {:>8}",
            "Column", "LSL", "USL", "Mean", "Std", "Cpk", "N", "Fail", "Rate"
        );
        for r in rows {
            let _ = writeln!(
                out,
                "{:<24} {:>9} {:>9} {:>10} {:>9} {:>7} {:>6} {:>6} {:>7.2}%",
                r.column_name,
                limit(r.lower_limit),
                limit(r.upper_limit),
                opt(r.mean, 4),
                opt(r.std_dev, 4),
                opt(r.cpk, 3),
                r.total_count,
                r.fail_count,
                r.fail_rate
            );
        }
    }

    let unmatched: Vec<_> = report.bindings.iter().filter(|b| b.column.is_none()).collect();
    if !unmatched.is_empty() {
        let _ = writeln!(out, "\n== Specs without a column ==");
        for b in unmatched {
            let _ = writeln!(
                out,
                "{} {} (best score {})",
                b.window_type, b.standard_type, b.score
            );
        }
    }
    out
}
