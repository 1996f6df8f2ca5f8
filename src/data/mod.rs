/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  header, Vec<DataRecord>, unique values per column
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply column selections → record indices for a run
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
