use std::collections::{BTreeMap, BTreeSet};

use super::model::{CellValue, Dataset};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map imposes no constraint; a present column with
/// an empty set selects nothing.
pub type FilterState = BTreeMap<String, BTreeSet<CellValue>>;

/// Initialise a [`FilterState`] with all values selected (i.e., every record).
pub fn init_filter_state(dataset: &Dataset) -> FilterState {
    dataset
        .unique_values
        .iter()
        .map(|(col, vals)| (col.clone(), vals.clone()))
        .collect()
}

/// Restrict `column` to exactly the given values.
pub fn select_only(filters: &mut FilterState, column: &str, values: impl IntoIterator<Item = CellValue>) {
    filters.insert(column.to_string(), values.into_iter().collect());
}

/// Return indices (positions in `dataset.records`) of records passing all
/// active filters.
///
/// A record passes a column filter when:
/// * The filter set for that column is empty → nothing selected → fails
/// * Every unique value of the column is selected → passes (no constraint)
/// * The record's value for that column is in the selected set → passes
/// * The column is missing from the record → passes only if `Null` is selected
pub fn filtered_indices(dataset: &Dataset, filters: &FilterState) -> Vec<usize> {
    let active: Vec<(Option<usize>, &BTreeSet<CellValue>, bool)> = filters
        .iter()
        .map(|(col, selected)| {
            let unconstrained = !selected.is_empty()
                && dataset
                    .unique_values
                    .get(col)
                    .is_some_and(|all| all.is_subset(selected));
            (dataset.column_index(col), selected, unconstrained)
        })
        .collect();

    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            for (col_idx, selected, unconstrained) in &active {
                if selected.is_empty() {
                    return false;
                }
                if *unconstrained {
                    continue;
                }
                match col_idx.and_then(|i| rec.get(i)) {
                    Some(val) => {
                        if !selected.contains(val) {
                            return false;
                        }
                    }
                    None => {
                        if !selected.contains(&CellValue::Null) {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn dataset() -> Dataset {
        Dataset::from_rows(
            vec!["File".into(), "Config".into()],
            vec![
                vec![s("a.log"), s("X")],
                vec![s("b.log"), s("Y")],
                vec![s("a.log"), s("Y")],
                vec![s("c.log")],
            ],
        )
    }

    #[test]
    fn full_selection_keeps_everything() {
        let ds = dataset();
        let filters = init_filter_state(&ds);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_filter_state_keeps_everything() {
        let ds = dataset();
        assert_eq!(filtered_indices(&ds, &FilterState::new()).len(), 4);
    }

    #[test]
    fn single_value_selection() {
        let ds = dataset();
        let mut filters = FilterState::new();
        select_only(&mut filters, "File", [s("a.log")]);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 2]);
    }

    #[test]
    fn empty_selection_hides_all() {
        let ds = dataset();
        let mut filters = FilterState::new();
        select_only(&mut filters, "Config", []);
        assert!(filtered_indices(&ds, &filters).is_empty());
    }

    #[test]
    fn missing_cell_requires_null_selection() {
        let ds = dataset();
        let mut filters = FilterState::new();
        select_only(&mut filters, "Config", [s("Y")]);
        assert_eq!(filtered_indices(&ds, &filters), vec![1, 2]);
        select_only(&mut filters, "Config", [s("Y"), CellValue::Null]);
        assert_eq!(filtered_indices(&ds, &filters), vec![1, 2, 3]);
    }
}
