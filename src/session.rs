use std::collections::{BTreeMap, BTreeSet};

use crate::capability::CpkCalculator;
use crate::config::AnalysisConfig;
use crate::data::filter::{filtered_indices, init_filter_state, FilterState};
use crate::data::model::{CellValue, Dataset};
use crate::evaluate::{CancelToken, RecordEvaluator};
use crate::region::RegionSet;
use crate::report::{AnalysisReport, BindingSummary};
use crate::spec::{SpecRegistry, WindowType};
use crate::stats::AggregateStatistics;

// ---------------------------------------------------------------------------
// Analysis session
// ---------------------------------------------------------------------------

/// Inputs of one analysis session, independent of any front-end.
///
/// Nothing computed by [`AnalysisSession::run`] is cached here: editing the
/// specs or filters and running again always starts from scratch.
pub struct AnalysisSession {
    pub dataset: Dataset,
    pub specs: SpecRegistry,
    pub polygons: RegionSet,
    pub config: AnalysisConfig,

    /// Per-column record selections.
    pub filters: FilterState,
}

impl AnalysisSession {
    /// Start a session with every record selected.
    pub fn new(dataset: Dataset, specs: SpecRegistry, polygons: RegionSet, config: AnalysisConfig) -> Self {
        let filters = init_filter_state(&dataset);
        AnalysisSession {
            dataset,
            specs,
            polygons,
            config,
            filters,
        }
    }

    /// Replace the spec set (e.g. after the user edited limits).
    pub fn set_specs(&mut self, specs: SpecRegistry) {
        self.specs = specs;
    }

    /// Indices of records passing the current filters.
    pub fn visible_indices(&self) -> Vec<usize> {
        filtered_indices(&self.dataset, &self.filters)
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if selected.contains(value) {
            selected.remove(value);
        } else {
            selected.insert(value.clone());
        }
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        if let Some(all_vals) = self.dataset.unique_values.get(column) {
            self.filters.insert(column.to_string(), all_vals.clone());
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
    }

    /// Evaluate the selected records and derive every statistic.
    pub fn run(&self) -> AnalysisReport {
        self.run_with_cancel(None)
    }

    /// Like [`AnalysisSession::run`], stopping between records when `cancel`
    /// fires. Statistics then cover the completed records only.
    pub fn run_with_cancel(&self, cancel: Option<&CancelToken>) -> AnalysisReport {
        let indices = self.visible_indices();
        let evaluator = RecordEvaluator::new(
            &self.dataset.column_names,
            &self.specs,
            &self.polygons,
            &self.config,
        );
        let outcome = evaluator.evaluate_batch(&self.dataset, &indices, cancel);
        let done = &indices[..outcome.results.len().min(indices.len())];

        let calculator = CpkCalculator::new(&self.config);
        let cpk: BTreeMap<WindowType, _> = WindowType::ALL
            .iter()
            .map(|&w| {
                (
                    w,
                    calculator.compute_window(&self.dataset, done, evaluator.bindings(), w),
                )
            })
            .collect();

        let stats = AggregateStatistics::new(&self.dataset, &self.config);
        let tables = stats.tables(&outcome.results, self.config.group_column.as_deref());

        let bindings = evaluator
            .bindings()
            .bound
            .iter()
            .map(BindingSummary::from_binding)
            .chain(
                evaluator
                    .bindings()
                    .unmatched
                    .iter()
                    .map(BindingSummary::from_unmatched),
            )
            .collect();

        AnalysisReport {
            total_records: self.dataset.len(),
            selected_records: indices.len(),
            cancelled: outcome.cancelled,
            error_count: outcome.error_count,
            bindings,
            results: outcome.results,
            cpk,
            tables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn session() -> AnalysisSession {
        let ds = Dataset::from_rows(
            vec!["Config".into(), "W_L".into()],
            vec![
                vec![s("A"), CellValue::Float(15.0)],
                vec![s("B"), CellValue::Float(25.0)],
                vec![s("A"), CellValue::Float(5.0)],
            ],
        );
        let mut specs = SpecRegistry::new();
        specs.set(WindowType::White, "L", 10.0, 20.0).unwrap();
        let config = AnalysisConfig {
            group_column: Some("Config".into()),
            ..Default::default()
        };
        AnalysisSession::new(ds, specs, RegionSet::new(), config)
    }

    #[test]
    fn run_produces_full_report() {
        let report = session().run();
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.tables.global.fail_count, 2);
        assert_eq!(report.tables.groups.len(), 2);
        assert_eq!(report.cpk[&WindowType::White].len(), 1);
        assert_eq!(report.cpk[&WindowType::White][0].total_count, 3);
        assert!(report.cpk[&WindowType::Mixed].is_empty());
    }

    #[test]
    fn filters_restrict_the_run() {
        let mut session = session();
        session.toggle_filter_value("Config", &s("B"));
        let report = session.run();
        assert_eq!(report.selected_records, 2);
        assert_eq!(report.tables.global.fail_count, 1);

        session.select_none("Config");
        assert!(session.run().results.is_empty());
        session.select_all("Config");
        assert_eq!(session.run().results.len(), 3);
    }

    #[test]
    fn rerun_after_spec_edit_starts_fresh() {
        let mut session = session();
        let before = session.run();
        let mut specs = SpecRegistry::new();
        specs.set(WindowType::White, "L", 0.0, 100.0).unwrap();
        session.set_specs(specs);
        let after = session.run();
        assert_eq!(before.tables.global.fail_count, 2);
        assert_eq!(after.tables.global.fail_count, 0);
        assert!(after.results.iter().all(|r| r.highlighted_cells.is_empty()));
    }

    #[test]
    fn cancelled_run_reports_partial_results() {
        let token = CancelToken::new();
        token.cancel();
        let report = session().run_with_cancel(Some(&token));
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(report.cpk[&WindowType::White][0].total_count, 0);
    }
}
