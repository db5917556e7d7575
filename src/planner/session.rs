//! The split planner's session knobs (spec §6 "Session knobs").

use crate::cnf::{DEFAULT_INDEX_RATIO, DEFAULT_LOWEST_CARDINALITY_THRESHOLD, DEFAULT_RANGES_PER_SPLIT};

/// Per-call planning knobs. `Default` sources its thresholds from [`crate::cnf`].
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
	pub optimize_range_predicate_pushdown: bool,
	pub secondary_index_enabled: bool,
	pub optimize_range_splits: bool,
	/// Fraction of `N` below which the single lowest-cardinality column is
	/// probed alone rather than intersecting every indexed constraint.
	pub lowest_cardinality_threshold: f64,
	/// Fraction of `N` above which the planner falls back to the row-ID
	/// pushdown ranges instead of per-row point ranges.
	pub index_ratio: f64,
	pub num_artificial_splits: usize,
	pub ranges_per_split: usize,
}

impl Default for Session {
	fn default() -> Self {
		Self {
			optimize_range_predicate_pushdown: true,
			secondary_index_enabled: true,
			optimize_range_splits: true,
			lowest_cardinality_threshold: *DEFAULT_LOWEST_CARDINALITY_THRESHOLD,
			index_ratio: *DEFAULT_INDEX_RATIO,
			num_artificial_splits: 0,
			ranges_per_split: *DEFAULT_RANGES_PER_SPLIT,
		}
	}
}
