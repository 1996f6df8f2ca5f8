use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Dataset};
use crate::config::AnalysisConfig;
use crate::region::RegionSet;
use crate::spec::{SpecRegistry, WindowType};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a test log from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – first row is the header, one record per line
/// * `.json`    – `[{ "SN": "...", "W_L": 312.5, ... }, ...]`
/// * `.parquet` – flat scalar columns
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" | "log" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    info!(
        "loaded {} records x {} columns from {}",
        dataset.len(),
        dataset.column_names.len(),
        path.display()
    );
    Ok(dataset)
}

/// Load a spec set:
///
/// ```json
/// { "White": { "L": [300, ""], "U": ["80", "0"] }, "Mixed": { "dY": { "lower": -1, "upper": 5 } } }
/// ```
///
/// Limits may be numbers, strings or null. Entries with unparsable limits
/// are dropped with a warning.
pub fn load_specs(path: &Path) -> Result<SpecRegistry> {
    let text = std::fs::read_to_string(path).context("reading spec file")?;
    parse_specs(&text)
}

pub fn parse_specs(text: &str) -> Result<SpecRegistry> {
    let root: JsonValue = serde_json::from_str(text).context("parsing spec JSON")?;
    let windows = root
        .as_object()
        .context("Expected top-level JSON object keyed by window type")?;

    let mut registry = SpecRegistry::new();
    for (window_key, entries) in windows {
        let window: WindowType = match window_key.parse() {
            Ok(w) => w,
            Err(e) => {
                warn!("skipping spec block: {e}");
                continue;
            }
        };
        let entries = entries
            .as_object()
            .with_context(|| format!("{window_key}: expected an object of standard types"))?;
        for (key, limits) in entries {
            let Some((lower, upper)) = limit_texts(limits) else {
                warn!("{window}/{key}: expected [lower, upper] or {{lower, upper}}");
                continue;
            };
            registry.set_text_lenient(window, key, &lower, &upper);
        }
    }
    Ok(registry)
}

fn limit_texts(val: &JsonValue) -> Option<(String, String)> {
    match val {
        JsonValue::Array(pair) if pair.len() == 2 => Some((json_text(&pair[0]), json_text(&pair[1]))),
        JsonValue::Object(obj) => Some((
            obj.get("lower").map(json_text).unwrap_or_default(),
            obj.get("upper").map(json_text).unwrap_or_default(),
        )),
        _ => None,
    }
}

/// Spec-sheet text of a JSON scalar; numbers keep their literal spelling so
/// the textual correction rules apply to them too.
fn json_text(val: &JsonValue) -> String {
    match val {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load region polygons: `{ "White": [[u, v], ...], "Mixed": [...] }`.
pub fn load_polygons(path: &Path) -> Result<RegionSet> {
    let text = std::fs::read_to_string(path).context("reading polygon file")?;
    serde_json::from_str(&text).context("parsing polygon JSON")
}

/// Load an [`AnalysisConfig`]; missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let text = std::fs::read_to_string(path).context("reading config file")?;
    let config: AnalysisConfig = serde_json::from_str(&text).context("parsing config JSON")?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (the default `df.to_json(orient='records')`).
/// Columns are the union of keys in first-seen order.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json_records(&text)
}

pub fn parse_json_records(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(Dataset::from_rows(columns, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, then one record per row.
/// Rows may be shorter than the header; they are kept as-is.
fn load_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    parse_csv(file)
}

pub fn parse_csv<R: std::io::Read>(input: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        bail!("CSV has no header row");
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_cell_type).collect());
    }

    Ok(Dataset::from_rows(headers, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = (0..batch.num_columns())
                .map(|c| extract_cell_value(batch.column(c), row))
                .collect();
            rows.push(cells);
        }
    }

    Ok(Dataset::from_rows(columns, rows))
}

// -- Parquet / Arrow helpers --

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell_value(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::String(s.value(row).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(a.value(row) as i64))
            .unwrap_or(CellValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(a.value(row) as f64))
            .unwrap_or(CellValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row)))
            .unwrap_or(CellValue::Null),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_ragged_rows() {
        let text = "SN,W_L,Result\nA1,312.5,PASS\nA2,,FAIL\nA3\n";
        let ds = parse_csv(text.as_bytes()).unwrap();
        assert_eq!(ds.column_names, vec!["SN", "W_L", "Result"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.records[0].number(1), Some(312.5));
        assert!(ds.records[1].get(1).is_some_and(CellValue::is_null));
        assert!(ds.records[2].get(1).is_none());
    }

    #[test]
    fn json_records_keep_key_order() {
        let text = r#"[{"SN": "A1", "W_L": 300, "W_u'": 0.19}, {"SN": "A2", "Extra": true}]"#;
        let ds = parse_json_records(text).unwrap();
        assert_eq!(ds.column_names, vec!["SN", "W_L", "W_u'", "Extra"]);
        assert_eq!(ds.records[1].get(1), Some(&CellValue::Null));
        assert_eq!(ds.records[0].get(1), Some(&CellValue::Integer(300)));
    }

    #[test]
    fn json_rejects_non_array() {
        assert!(parse_json_records(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn specs_apply_text_corrections() {
        let text = r#"{
            "White": { "W_Lightness": [-1, 500], "U": ["80", "0"], "dY": ["abc", 1] },
            "Mixed": { "dY": { "lower": null, "upper": 5 } },
            "Blue": { "L": [1, 2] }
        }"#;
        let reg = parse_specs(text).unwrap();
        assert_eq!(reg.get(WindowType::White, "L"), Some((0.0, 500.0)));
        assert_eq!(reg.get(WindowType::White, "U"), Some((80.0, 100.0)));
        assert!(reg.get(WindowType::White, "dY").is_none());
        assert_eq!(reg.get(WindowType::Mixed, "dY"), Some((f64::NEG_INFINITY, 5.0)));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn guesses_cell_types() {
        assert_eq!(guess_cell_type("12"), CellValue::Integer(12));
        assert_eq!(guess_cell_type("1.5"), CellValue::Float(1.5));
        assert_eq!(guess_cell_type(" "), CellValue::Null);
        assert_eq!(guess_cell_type("PASS"), CellValue::String("PASS".into()));
    }
}
