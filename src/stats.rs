//! Yield and defect roll-ups over a set of evaluation results.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::capability::{mean, std_dev};
use crate::config::AnalysisConfig;
use crate::data::model::{CellValue, DataRecord, Dataset};
use crate::evaluate::EvaluationResult;
use crate::spec::WindowType;

/// Group label used for records without a value in the grouping column.
pub const BLANK_GROUP: &str = "(blank)";

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldRow {
    pub group: String,
    pub total: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    /// `fail_count / total * 100`, 0 for an empty group.
    pub fail_rate: f64,
    pub yield_rate: f64,
}

impl YieldRow {
    fn from_results<'r>(group: &str, results: impl IntoIterator<Item = &'r EvaluationResult>) -> Self {
        let (mut total, mut fail_count) = (0usize, 0usize);
        for r in results {
            total += 1;
            if !r.pass {
                fail_count += 1;
            }
        }
        let fail_rate = percent(fail_count, total);
        YieldRow {
            group: group.to_string(),
            total,
            pass_count: total - fail_count,
            fail_count,
            fail_rate,
            yield_rate: if total == 0 { 0.0 } else { 100.0 - fail_rate },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectRow {
    /// Column name, or the friendly label for a chromaticity column.
    pub label: String,
    pub column_index: usize,
    pub fail_count: usize,
    /// Share of the evaluated records this column failed, in percent.
    pub fail_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDefects {
    pub group: String,
    pub defects: Vec<DefectRow>,
}

/// Yield and top-defect tables, globally and per group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTables {
    pub global: YieldRow,
    pub groups: Vec<YieldRow>,
    pub top_defects: Vec<DefectRow>,
    pub group_defects: Vec<GroupDefects>,
}

/// Numeric summary of one column (count, mean, spread, range).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// AggregateStatistics
// ---------------------------------------------------------------------------

pub struct AggregateStatistics<'a> {
    dataset: &'a Dataset,
    config: &'a AnalysisConfig,
}

impl<'a> AggregateStatistics<'a> {
    pub fn new(dataset: &'a Dataset, config: &'a AnalysisConfig) -> Self {
        AggregateStatistics { dataset, config }
    }

    fn record_lookup(&self) -> BTreeMap<usize, &'a DataRecord> {
        self.dataset
            .records
            .iter()
            .map(|r| (r.index(), r))
            .collect()
    }

    /// Split results by the value of `group_column`, groups in first-seen order.
    pub fn group_results<'r>(
        &self,
        results: &'r [EvaluationResult],
        group_column: &str,
    ) -> Vec<(String, Vec<&'r EvaluationResult>)> {
        let Some(col) = self.dataset.column_index(group_column) else {
            return Vec::new();
        };
        let lookup = self.record_lookup();
        let mut groups: Vec<(String, Vec<&'r EvaluationResult>)> = Vec::new();
        for r in results {
            let label = lookup
                .get(&r.row_index)
                .and_then(|rec| rec.get(col))
                .filter(|c| !c.is_null())
                .map(CellValue::to_string)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| BLANK_GROUP.to_string());
            match groups.iter_mut().find(|(g, _)| *g == label) {
                Some((_, members)) => members.push(r),
                None => groups.push((label, vec![r])),
            }
        }
        groups
    }

    pub fn yield_row(&self, label: &str, results: &[EvaluationResult]) -> YieldRow {
        YieldRow::from_results(label, results)
    }

    /// Rank columns by how many records they failed.
    ///
    /// The `v` coordinate columns are left out and the `u` coordinate
    /// columns appear under their display label, so a color-point failure
    /// counts once. Ties keep header order.
    pub fn top_defects<'r>(&self, results: impl IntoIterator<Item = &'r EvaluationResult>) -> Vec<DefectRow> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        let mut evaluated = 0usize;
        for r in results {
            evaluated += 1;
            for &cell in &r.highlighted_cells {
                *counts.entry(cell).or_default() += 1;
            }
        }

        let names = &self.dataset.column_names;
        let position = |name: &str| names.iter().position(|c| c == name);
        let mut hidden = Vec::new();
        let mut labels: BTreeMap<usize, String> = BTreeMap::new();
        for window in WindowType::ALL {
            let chroma = self.config.chromaticity(window);
            if let Some(v) = position(chroma.v_column.as_str()) {
                hidden.push(v);
            }
            if let Some(u) = position(chroma.u_column.as_str()) {
                labels.insert(u, chroma.display_label.clone());
            }
        }

        let mut rows: Vec<DefectRow> = counts
            .into_iter()
            .filter(|(idx, _)| !hidden.contains(idx))
            .map(|(idx, n)| DefectRow {
                label: labels
                    .get(&idx)
                    .cloned()
                    .or_else(|| names.get(idx).cloned())
                    .unwrap_or_else(|| format!("column {idx}")),
                column_index: idx,
                fail_count: n,
                fail_rate: percent(n, evaluated),
            })
            .collect();
        rows.sort_by(|a, b| b.fail_count.cmp(&a.fail_count));
        rows
    }

    /// Global and (when `group_column` is set and present) per-group tables.
    pub fn tables(&self, results: &[EvaluationResult], group_column: Option<&str>) -> AggregateTables {
        let grouped = group_column
            .map(|g| self.group_results(results, g))
            .unwrap_or_default();

        AggregateTables {
            global: YieldRow::from_results("All", results),
            groups: grouped
                .iter()
                .map(|(g, members)| YieldRow::from_results(g, members.iter().copied()))
                .collect(),
            top_defects: self.top_defects(results),
            group_defects: grouped
                .iter()
                .map(|(g, members)| GroupDefects {
                    group: g.clone(),
                    defects: self.top_defects(members.iter().copied()),
                })
                .collect(),
        }
    }

    /// Numeric summary of `column` over the records at `indices`.
    pub fn describe(&self, indices: &[usize], column: &str) -> Option<ColumnSummary> {
        let col = self.dataset.column_index(column)?;
        let values: Vec<f64> = indices
            .iter()
            .filter_map(|&i| self.dataset.records.get(i))
            .filter_map(|r| r.number(col))
            .collect();
        Some(ColumnSummary {
            column: column.to_string(),
            count: values.len(),
            mean: mean(&values),
            std_dev: std_dev(&values),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn result(row: usize, cells: &[usize]) -> EvaluationResult {
        EvaluationResult {
            row_index: row,
            pass: cells.is_empty(),
            failed_descriptions: cells.iter().map(|c| format!("c{c}")).collect(),
            highlighted_cells: cells.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn dataset(n: usize) -> Dataset {
        let cols = ["Config", "W_L", "W_u'", "W_v'", "W_dY"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = (0..n)
            .map(|i| {
                vec![
                    if i % 2 == 0 { s("A") } else { s("B") },
                    CellValue::Float(i as f64),
                    CellValue::Float(0.2),
                    CellValue::Float(0.46),
                    CellValue::Null,
                ]
            })
            .collect();
        Dataset::from_rows(cols, rows)
    }

    #[test]
    fn ten_records_three_fail() {
        let ds = dataset(10);
        let cfg = AnalysisConfig::default();
        let stats = AggregateStatistics::new(&ds, &cfg);
        let results: Vec<_> = (0..10)
            .map(|i| if i < 3 { result(i, &[1]) } else { result(i, &[]) })
            .collect();
        let row = stats.yield_row("All", &results);
        assert_eq!(row.total, 10);
        assert_eq!(row.fail_count, 3);
        assert_eq!(row.pass_count, 7);
        assert!((row.fail_rate - 30.0).abs() < 1e-12);
        assert!((row.yield_rate - 70.0).abs() < 1e-12);
    }

    #[test]
    fn empty_group_has_zero_rates() {
        let ds = dataset(0);
        let cfg = AnalysisConfig::default();
        let row = AggregateStatistics::new(&ds, &cfg).yield_row("All", &[]);
        assert_eq!((row.total, row.fail_rate, row.yield_rate), (0, 0.0, 0.0));
    }

    #[test]
    fn groups_in_first_seen_order() {
        let ds = dataset(4);
        let cfg = AnalysisConfig::default();
        let stats = AggregateStatistics::new(&ds, &cfg);
        let results = vec![result(0, &[1]), result(1, &[]), result(2, &[]), result(3, &[4])];
        let tables = stats.tables(&results, Some("Config"));
        let groups: Vec<_> = tables
            .groups
            .iter()
            .map(|g| (g.group.as_str(), g.total, g.fail_count))
            .collect();
        assert_eq!(groups, vec![("A", 2, 1), ("B", 2, 1)]);
        assert_eq!(tables.group_defects[0].defects[0].label, "W_L");
        assert_eq!(tables.global.fail_count, 2);
    }

    #[test]
    fn missing_group_column_yields_no_groups() {
        let ds = dataset(2);
        let cfg = AnalysisConfig::default();
        let tables = AggregateStatistics::new(&ds, &cfg).tables(&[result(0, &[])], Some("Nope"));
        assert!(tables.groups.is_empty());
    }

    #[test]
    fn top_defects_rank_and_relabel() {
        let ds = dataset(5);
        let cfg = AnalysisConfig::default();
        let stats = AggregateStatistics::new(&ds, &cfg);
        let results = vec![
            result(0, &[2, 3]),
            result(1, &[2, 3, 4]),
            result(2, &[1]),
            result(3, &[4]),
            result(4, &[2, 3]),
        ];
        let ranked = stats.top_defects(&results);
        let labels: Vec<_> = ranked.iter().map(|d| (d.label.as_str(), d.fail_count)).collect();
        // W_v' is excluded; W_dY and W_L tie order follows header order
        assert_eq!(
            labels,
            vec![("White Color Point", 3), ("W_dY", 2), ("W_L", 1)]
        );
        assert!((ranked[0].fail_rate - 60.0).abs() < 1e-12);
    }

    #[test]
    fn stable_ties() {
        let ds = dataset(2);
        let cfg = AnalysisConfig::default();
        let stats = AggregateStatistics::new(&ds, &cfg);
        let ranked = stats.top_defects(&[result(0, &[4]), result(1, &[1])]);
        let order: Vec<_> = ranked.iter().map(|d| d.column_index).collect();
        assert_eq!(order, vec![1, 4]);
    }

    #[test]
    fn describe_numeric_column() {
        let ds = dataset(5);
        let cfg = AnalysisConfig::default();
        let stats = AggregateStatistics::new(&ds, &cfg);
        let summary = stats.describe(&[0, 1, 2, 3, 4], "W_L").unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean, Some(2.0));
        assert_eq!(summary.min, Some(0.0));
        assert_eq!(summary.max, Some(4.0));
        let blank = stats.describe(&[0, 1], "W_dY").unwrap();
        assert_eq!(blank.count, 0);
        assert!(blank.mean.is_none());
        assert!(stats.describe(&[0], "missing").is_none());
    }
}
