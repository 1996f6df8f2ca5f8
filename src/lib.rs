//! # testlog-analyzer
//!
//! Evaluation and statistics engine for manufacturing test logs.
//!
//! Given a header-detected test log, a set of acceptance limits per window
//! type and optional chromaticity acceptance regions, the engine binds each
//! limit to a column, judges every record, and derives capability (Cpk) and
//! yield/defect statistics.
//!
//! ## Modules
//!
//! - [`data`]: dataset model, file ingestion adapter, record filters
//! - [`spec`]: spec registry with key normalization and limit correction
//! - [`matching`]: fuzzy standard-type → column binding
//! - [`region`]: point-in-polygon color-region containment
//! - [`evaluate`]: per-record pass/fail, batch runner with cancellation
//! - [`capability`]: Cpk per bound column
//! - [`stats`]: yield tables, top-defect rankings, column summaries
//! - [`session`]: one analysis session producing an [`report::AnalysisReport`]
//! - [`report`]: JSON / CSV export and text rendering

pub mod capability;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod matching;
pub mod region;
pub mod report;
pub mod session;
pub mod spec;
pub mod stats;

pub use config::AnalysisConfig;
pub use data::model::{CellValue, DataRecord, Dataset};
pub use evaluate::{CancelToken, EvaluationResult, RecordEvaluator};
pub use region::{RegionPolygon, RegionSet};
pub use session::AnalysisSession;
pub use spec::{SpecRegistry, WindowType};
