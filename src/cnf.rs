//! Named constants and environment-overridable defaults.
//!
//! Mirrors the teacher's `cnf` module: a small set of `Lazy<T>` statics
//! parsed from the environment with a hard-coded fallback, plus a handful of
//! plain `const`s for values nothing should ever need to override.

use once_cell::sync::Lazy;

/// Default worker-thread count for parallel per-column cardinality probes
/// and index scans (spec: "the `BatchScanner` abstraction admits 10 worker
/// threads in the source").
pub static PLANNER_PROBE_CONCURRENCY: Lazy<usize> =
	lazy_env_parse!("ACCUMULO_CONNECTOR_PLANNER_PROBE_CONCURRENCY", usize, 10);

/// Default `lowest_cardinality_threshold` session knob.
pub static DEFAULT_LOWEST_CARDINALITY_THRESHOLD: Lazy<f64> =
	lazy_env_parse!("ACCUMULO_CONNECTOR_LOWEST_CARDINALITY_THRESHOLD", f64, 0.05);

/// Default `index_ratio` session knob.
pub static DEFAULT_INDEX_RATIO: Lazy<f64> =
	lazy_env_parse!("ACCUMULO_CONNECTOR_INDEX_RATIO", f64, 0.5);

/// Default `ranges_per_split` session knob.
pub static DEFAULT_RANGES_PER_SPLIT: Lazy<usize> =
	lazy_env_parse!("ACCUMULO_CONNECTOR_RANGES_PER_SPLIT", usize, 10);

/// Sentinel row-id identifying the global row-statistics row in a metrics
/// table.
pub const METRICS_TABLE_ROW_ID: &[u8] = b"___METRICS_TABLE___";

/// Column family carrying the global row-statistics qualifiers.
pub const METRICS_TABLE_ROWS_CF: &[u8] = b"___rows___";

/// Qualifier carrying a per-value or global cardinality.
pub const CARDINALITY_CQ: &[u8] = b"___card___";

/// Qualifier carrying the lexicographically smallest indexed row-id.
pub const FIRST_ROW_CQ: &[u8] = b"___first_row___";

/// Qualifier carrying the lexicographically largest indexed row-id.
pub const LAST_ROW_CQ: &[u8] = b"___last_row___";

/// Preferred host returned when a tablet's location cannot be resolved.
pub const UNKNOWN_TABLET_LOCATION: &str = "unknown:0";
