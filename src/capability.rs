//! Process capability (Cpk) per bound column.
//!
//! ```text
//! Cpu = (USL - mean) / (3 * sigma)
//! Cpl = (mean - LSL) / (3 * sigma)
//! Cpk = min(Cpu, Cpl)            two-sided
//! ```
//!
//! Which side(s) apply is decided per column, first match wins:
//!
//! 1. window-prefixed "max deviation" column → upper only
//! 2. window-prefixed column with an `L` / `U` token → lower only
//! 3. `LSL == 0` and `USL != 0` → upper only
//! 4. `USL == 0` and `LSL != 0` → lower only
//! 5. otherwise two-sided
//!
//! The fail count reuses the same side selection, so a one-sided metric is
//! never failed on the bound it ignores.
//!
//! # References
//!
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 8.

use serde::Serialize;
use u_numflow::stats;

use crate::config::{approx_eq, AnalysisConfig};
use crate::data::model::Dataset;
use crate::matching::{normalize_text, ColumnBindings};
use crate::spec::{synonyms_for, WindowType, MAX_DEVIATION};

/// Which specification limits a capability figure is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapabilityMode {
    UpperOnly,
    LowerOnly,
    TwoSided,
}

impl CapabilityMode {
    /// Pick the mode for a column, first matching rule wins.
    pub fn select(window: WindowType, column_name: &str, lower: f64, upper: f64) -> Self {
        let prefix = window.prefix();
        let body = column_name
            .get(..prefix.len())
            .filter(|h| h.eq_ignore_ascii_case(prefix))
            .map(|_| normalize_text(&column_name[prefix.len()..]));

        if let Some(body) = &body {
            let padded = format!(" {body} ");
            if synonyms_for(MAX_DEVIATION)
                .iter()
                .any(|t| padded.contains(&format!(" {t} ")))
            {
                return CapabilityMode::UpperOnly;
            }
            if body.split_whitespace().any(|t| t == "l" || t == "u") {
                return CapabilityMode::LowerOnly;
            }
        }
        if lower == 0.0 && upper != 0.0 {
            CapabilityMode::UpperOnly
        } else if upper == 0.0 && lower != 0.0 {
            CapabilityMode::LowerOnly
        } else {
            CapabilityMode::TwoSided
        }
    }

    pub fn uses_lower(self) -> bool {
        matches!(self, CapabilityMode::LowerOnly | CapabilityMode::TwoSided)
    }

    pub fn uses_upper(self) -> bool {
        matches!(self, CapabilityMode::UpperOnly | CapabilityMode::TwoSided)
    }
}

/// Capability figures for one bound column.
///
/// Statistical fields are `None` when they cannot be computed: fewer than
/// two samples, zero spread, or an infinite limit on a used side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpkResult {
    pub window_type: WindowType,
    pub standard_type: String,
    pub column_name: String,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub mode: CapabilityMode,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std_dev: Option<f64>,
    pub cpl: Option<f64>,
    pub cpu: Option<f64>,
    pub cpk: Option<f64>,
    pub total_count: usize,
    pub fail_count: usize,
    /// Percentage of samples outside the used limit(s).
    pub fail_rate: f64,
}

/// Sample mean; `None` for empty input.
pub fn mean(data: &[f64]) -> Option<f64> {
    stats::mean(data)
}

/// Sample standard deviation (Bessel-corrected); `None` for fewer than two values.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    stats::std_dev(data)
}

/// `(Cpl, Cpu, Cpk)` for given moments. Undefined figures are `None`;
/// a zero or non-finite sigma makes all three undefined.
pub fn capability_indices(
    mean: f64,
    sigma: f64,
    lower: f64,
    upper: f64,
    mode: CapabilityMode,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    if !sigma.is_finite() || sigma <= 0.0 {
        return (None, None, None);
    }
    let finite = |x: f64| Some(x).filter(|v| v.is_finite());
    let cpl = if mode.uses_lower() {
        finite((mean - lower) / (3.0 * sigma))
    } else {
        None
    };
    let cpu = if mode.uses_upper() {
        finite((upper - mean) / (3.0 * sigma))
    } else {
        None
    };
    let cpk = match mode {
        CapabilityMode::UpperOnly => cpu,
        CapabilityMode::LowerOnly => cpl,
        CapabilityMode::TwoSided => match (cpl, cpu) {
            (Some(l), Some(u)) => Some(l.min(u)),
            // one side is an infinite sentinel
            (Some(l), None) if upper == f64::INFINITY => Some(l),
            (None, Some(u)) if lower == f64::NEG_INFINITY => Some(u),
            _ => None,
        },
    };
    (cpl, cpu, cpk)
}

// ---------------------------------------------------------------------------
// CpkCalculator
// ---------------------------------------------------------------------------

pub struct CpkCalculator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> CpkCalculator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        CpkCalculator { config }
    }

    fn violates(&self, v: f64, lower: f64, upper: f64, mode: CapabilityMode) -> bool {
        let (rel, abs) = (self.config.rel_tol, self.config.abs_tol);
        let below = mode.uses_lower() && v < lower && !approx_eq(v, lower, rel, abs);
        let above = mode.uses_upper() && v > upper && !approx_eq(v, upper, rel, abs);
        below || above
    }

    /// Capability of one column. NaN samples are dropped.
    pub fn compute(
        &self,
        window: WindowType,
        standard_type: &str,
        column_name: &str,
        lower: f64,
        upper: f64,
        samples: &[f64],
    ) -> CpkResult {
        let data: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
        let mode = CapabilityMode::select(window, column_name, lower, upper);

        let m = mean(&data);
        let sd = std_dev(&data);
        let (cpl, cpu, cpk) = match (m, sd) {
            (Some(m), Some(sd)) => capability_indices(m, sd, lower, upper, mode),
            _ => (None, None, None),
        };

        let total_count = data.len();
        let fail_count = data
            .iter()
            .filter(|&&v| self.violates(v, lower, upper, mode))
            .count();
        let fail_rate = if total_count == 0 {
            0.0
        } else {
            fail_count as f64 / total_count as f64 * 100.0
        };

        CpkResult {
            window_type: window,
            standard_type: standard_type.to_string(),
            column_name: column_name.to_string(),
            lower_limit: lower,
            upper_limit: upper,
            mode,
            mean: m,
            std_dev: sd,
            cpl,
            cpu,
            cpk,
            total_count,
            fail_count,
            fail_rate,
        }
    }

    /// One result per bound spec of `window`, over the records at `indices`.
    pub fn compute_window(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        bindings: &ColumnBindings,
        window: WindowType,
    ) -> Vec<CpkResult> {
        bindings
            .for_window(window)
            .map(|b| {
                let samples: Vec<f64> = indices
                    .iter()
                    .filter_map(|&i| dataset.records.get(i))
                    .filter_map(|r| r.number(b.column_index))
                    .collect();
                let (lower, upper) = b.spec.limits();
                self.compute(window, &b.spec.standard_type, &b.column_name, lower, upper, &samples)
            })
            .collect()
    }
}
