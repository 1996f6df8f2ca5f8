//! Per-record pass/fail judgement.
//!
//! A [`RecordEvaluator`] is built once per run from an immutable snapshot of
//! the header, the spec set, the region polygons and the configuration. It
//! then judges records independently: no state carries over from one record
//! to the next, and every run produces brand-new [`EvaluationResult`]s.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::config::{approx_eq, AnalysisConfig};
use crate::data::model::{CellValue, DataRecord, Dataset};
use crate::error::EvalError;
use crate::matching::ColumnBindings;
use crate::region::{Point, RegionPolygon, RegionSet};
use crate::spec::{SpecRegistry, WindowType};

/// Sole failure description of a record whose evaluation errored.
pub const EVALUATION_ERROR: &str = "evaluation-error";

// ---------------------------------------------------------------------------
// EvaluationResult
// ---------------------------------------------------------------------------

/// Verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub row_index: usize,
    pub pass: bool,
    /// Distinct failing column names (or column pairs), in check order.
    pub failed_descriptions: Vec<String>,
    /// Column positions to emphasize when the row is rendered.
    pub highlighted_cells: BTreeSet<usize>,
}

impl EvaluationResult {
    fn new(row_index: usize) -> Self {
        EvaluationResult {
            row_index,
            pass: true,
            failed_descriptions: Vec::new(),
            highlighted_cells: BTreeSet::new(),
        }
    }

    /// The Fail result recorded for a row whose evaluation errored.
    pub fn evaluation_error(row_index: usize) -> Self {
        EvaluationResult {
            row_index,
            pass: false,
            failed_descriptions: vec![EVALUATION_ERROR.to_string()],
            highlighted_cells: BTreeSet::new(),
        }
    }

    pub fn is_evaluation_error(&self) -> bool {
        self.failed_descriptions.len() == 1 && self.failed_descriptions[0] == EVALUATION_ERROR
    }

    fn fail(&mut self, description: String, cells: &[usize]) {
        self.pass = false;
        if !self.failed_descriptions.contains(&description) {
            self.failed_descriptions.push(description);
        }
        self.highlighted_cells.extend(cells.iter().copied());
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, checked between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of one batch run. `results` follows the order of the requested
/// indices; after a cancellation it holds only the completed records.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<EvaluationResult>,
    pub cancelled: bool,
    pub error_count: usize,
}

// ---------------------------------------------------------------------------
// RecordEvaluator
// ---------------------------------------------------------------------------

/// Region check for one window, resolved against the header.
#[derive(Debug, Clone)]
struct RegionCheck {
    window: WindowType,
    polygon: RegionPolygon,
    u_index: usize,
    v_index: usize,
    description: String,
}

pub struct RecordEvaluator<'a> {
    columns: &'a [String],
    bindings: ColumnBindings,
    regions: Vec<RegionCheck>,
    marker_index: Option<usize>,
    config: &'a AnalysisConfig,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(
        columns: &'a [String],
        specs: &SpecRegistry,
        polygons: &RegionSet,
        config: &'a AnalysisConfig,
    ) -> Self {
        let bindings = ColumnBindings::resolve(specs, columns, config);
        let position = |name: &str| columns.iter().position(|c| c == name);

        let regions = WindowType::ALL
            .iter()
            .filter_map(|&window| {
                let chroma = config.chromaticity(window);
                let (u_index, v_index) = (position(chroma.u_column.as_str())?, position(chroma.v_column.as_str())?);
                Some(RegionCheck {
                    window,
                    polygon: polygons.effective(window),
                    u_index,
                    v_index,
                    description: format!("{}/{}", chroma.u_column, chroma.v_column),
                })
            })
            .collect();

        let marker_index = config
            .fail_marker_column
            .as_deref()
            .and_then(position);

        RecordEvaluator {
            columns,
            bindings,
            regions,
            marker_index,
            config,
        }
    }

    pub fn bindings(&self) -> &ColumnBindings {
        &self.bindings
    }

    /// Windows whose chromaticity columns are present in the header.
    pub fn region_windows(&self) -> impl Iterator<Item = WindowType> + '_ {
        self.regions.iter().map(|r| r.window)
    }

    /// Whether `v` violates `[lower, upper]`. Values approximately equal to
    /// a limit never fail on that limit.
    pub fn out_of_limits(&self, v: f64, lower: f64, upper: f64) -> bool {
        let (rel, abs) = (self.config.rel_tol, self.config.abs_tol);
        let below = v < lower && !approx_eq(v, lower, rel, abs);
        let above = v > upper && !approx_eq(v, upper, rel, abs);
        below || above
    }

    fn cell<'r>(&self, record: &'r DataRecord, column: usize) -> Result<&'r CellValue, EvalError> {
        record.get(column).ok_or_else(|| EvalError::MissingCell {
            row: record.index(),
            column: self.columns[column].clone(),
        })
    }

    /// Judge one record.
    ///
    /// # Errors
    ///
    /// [`EvalError`] when the record is structurally unusable (ragged row,
    /// non-finite coordinates). Non-numeric cells are not errors: the check
    /// is skipped.
    pub fn evaluate(&self, record: &DataRecord) -> Result<EvaluationResult, EvalError> {
        let mut result = EvaluationResult::new(record.index());

        for binding in &self.bindings.bound {
            let Some(v) = self.cell(record, binding.column_index)?.as_f64() else {
                continue;
            };
            let (lower, upper) = binding.spec.limits();
            if self.out_of_limits(v, lower, upper) {
                result.fail(binding.column_name.clone(), &[binding.column_index]);
            }
        }

        for region in &self.regions {
            let u = self.cell(record, region.u_index)?.as_f64();
            let v = self.cell(record, region.v_index)?.as_f64();
            let (Some(u), Some(v)) = (u, v) else {
                continue;
            };
            for (value, idx) in [(u, region.u_index), (v, region.v_index)] {
                if !value.is_finite() {
                    return Err(EvalError::NonFiniteCoordinate {
                        row: record.index(),
                        column: self.columns[idx].clone(),
                    });
                }
            }
            if !region.polygon.contains(Point::new(u, v)) {
                result.fail(region.description.clone(), &[region.u_index, region.v_index]);
            }
        }

        if let Some(idx) = self.marker_index {
            let marked = record
                .get(idx)
                .and_then(|c| c.as_text())
                .is_some_and(|t| self.config.is_fail_marker(t));
            if marked {
                result.fail(self.columns[idx].clone(), &[]);
            }
        }

        Ok(result)
    }

    /// Judge one record, converting an evaluation error into a Fail result.
    pub fn evaluate_or_flag(&self, record: &DataRecord) -> EvaluationResult {
        match self.evaluate(record) {
            Ok(r) => r,
            Err(e) => {
                warn!("{e}; marking row as {EVALUATION_ERROR}");
                EvaluationResult::evaluation_error(record.index())
            }
        }
    }

    /// Judge the records at `indices` (positions in `dataset.records`)
    /// sequentially. Stops between records once `cancel` fires.
    pub fn evaluate_batch(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        cancel: Option<&CancelToken>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &i in indices {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                outcome.cancelled = true;
                break;
            }
            let Some(record) = dataset.records.get(i) else {
                continue;
            };
            let result = self.evaluate_or_flag(record);
            if result.is_evaluation_error() {
                outcome.error_count += 1;
            }
            outcome.results.push(result);
        }

        let fails = outcome.results.iter().filter(|r| !r.pass).count();
        info!(
            "evaluated {} rows: {} fail, {} errors{}",
            outcome.results.len(),
            fails,
            outcome.error_count,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
        outcome
    }
}
