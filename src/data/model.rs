use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a test log
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as produced by the ingestion layer.
/// Used as a `BTreeMap` / `BTreeSet` key downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --
// Equality follows the total order: NaN equals itself, 0.0 and -0.0 differ.

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, ""),
        }
    }
}

impl CellValue {
    /// Interpret the cell as a finite-or-infinite number.
    ///
    /// Numeric text is parsed (test logs frequently store numbers as text);
    /// NaN, empty strings and non-numeric text yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Float(v) => *v,
            CellValue::Integer(i) => *i as f64,
            CellValue::String(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Bool(_) | CellValue::Null => return None,
        };
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// Textual form used for marker comparison and grouping labels.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// DataRecord – one row of the test log
// ---------------------------------------------------------------------------

/// A single test-log row. Cells are positional; the column names live on
/// the owning [`Dataset`]. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    index: usize,
    values: Vec<CellValue>,
}

impl DataRecord {
    pub fn new(index: usize, values: Vec<CellValue>) -> Self {
        DataRecord { index, values }
    }

    /// Stable row index (position in the source log).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    /// Cell at a column position. `None` for ragged rows shorter than the header.
    pub fn get(&self, column: usize) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// Numeric value at a column position, if the cell exists and is numeric.
    pub fn number(&self, column: usize) -> Option<f64> {
        self.get(column).and_then(CellValue::as_f64)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded test log
// ---------------------------------------------------------------------------

/// The full parsed test log with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Ordered header, already deduplicated upstream.
    pub column_names: Vec<String>,
    /// All records (rows).
    pub records: Vec<DataRecord>,
    /// For each column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,
}

impl Dataset {
    /// Build the dataset and its column indices from header + raw rows.
    /// Row indices are assigned in input order.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut unique_values: BTreeMap<String, BTreeSet<CellValue>> = column_names
            .iter()
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();

        let records: Vec<DataRecord> = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                for (col, val) in column_names.iter().zip(values.iter()) {
                    if let Some(set) = unique_values.get_mut(col) {
                        set.insert(val.clone());
                    }
                }
                DataRecord::new(i, values)
            })
            .collect();

        Dataset {
            column_names,
            records,
            unique_values,
        }
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    #[test]
    fn numeric_text_parses() {
        assert_eq!(s(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(CellValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(s("abc").as_f64(), None);
        assert_eq!(s("").as_f64(), None);
        assert_eq!(CellValue::Float(f64::NAN).as_f64(), None);
        assert_eq!(CellValue::Null.as_f64(), None);
    }

    #[test]
    fn equality_agrees_with_ordering_and_hash() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        fn hash(v: &CellValue) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let nan = CellValue::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(hash(&nan), hash(&nan.clone()));

        let (pos, neg) = (CellValue::Float(0.0), CellValue::Float(-0.0));
        assert_ne!(pos, neg);
        assert_ne!(pos.cmp(&neg), std::cmp::Ordering::Equal);

        let set: BTreeSet<CellValue> = [nan.clone(), nan, pos, neg].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn dataset_collects_unique_values() {
        let ds = Dataset::from_rows(
            vec!["Config".into(), "W_L".into()],
            vec![
                vec![s("A"), CellValue::Float(1.0)],
                vec![s("B"), CellValue::Float(2.0)],
                vec![s("A"), CellValue::Float(1.0)],
            ],
        );
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.unique_values["Config"].len(), 2);
        assert_eq!(ds.records[2].index(), 2);
        assert_eq!(ds.column_index("W_L"), Some(1));
    }

    #[test]
    fn ragged_row_has_no_cell() {
        let rec = DataRecord::new(0, vec![CellValue::Float(1.0)]);
        assert!(rec.get(3).is_none());
        assert_eq!(rec.number(0), Some(1.0));
    }

    #[test]
    fn cell_ordering_is_total() {
        let mut set = BTreeSet::new();
        set.insert(CellValue::Float(f64::NAN));
        set.insert(CellValue::Null);
        set.insert(s("x"));
        set.insert(CellValue::Integer(1));
        let first = set.iter().next().cloned();
        assert_eq!(first, Some(CellValue::Null));
    }
}
