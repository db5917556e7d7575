//! Builds the mutations the indexer writes to `T_idx` and `T_idx_metrics`.
//! Pure functions, kept separate from [`super::Indexer`] so the key layout
//! (spec §3, §6) has one place that can be checked against the GLOSSARY's
//! cell shapes. Grounded on `core/src/key/thing/mod.rs`'s style of small
//! free functions building one key shape each.

use crate::cell::{Mutation, Row};
use crate::cnf::{CARDINALITY_CQ, FIRST_ROW_CQ, LAST_ROW_CQ, METRICS_TABLE_ROWS_CF, METRICS_TABLE_ROW_ID};

/// One `T_idx` cell: `(row = value, family = f_q, qualifier = source row-ID,
/// value = ∅)`.
pub(crate) fn index_mutation(value: &[u8], family_q: &[u8], row: &Row) -> Mutation {
	Mutation::new(value.to_vec()).put(family_q.to_vec(), row.clone(), Vec::new())
}

/// One per-value `T_idx_metrics` cell: `(row = value, family = f_q,
/// qualifier = "___card___", value = decimal count as ASCII)`.
pub(crate) fn cardinality_mutation(value: &[u8], family_q: &[u8], count: u64) -> Mutation {
	Mutation::new(value.to_vec()).put(family_q.to_vec(), CARDINALITY_CQ.to_vec(), count.to_string().into_bytes())
}

/// The global row-statistics sentinel row: `row = "___METRICS_TABLE___"`,
/// `family = "___rows___"`, with the three qualifiers from spec §3.
pub(crate) fn sentinel_mutation(count: u64, first_row: &Row, last_row: &Row) -> Mutation {
	Mutation::new(METRICS_TABLE_ROW_ID.to_vec())
		.put(METRICS_TABLE_ROWS_CF.to_vec(), CARDINALITY_CQ.to_vec(), count.to_string().into_bytes())
		.put(METRICS_TABLE_ROWS_CF.to_vec(), FIRST_ROW_CQ.to_vec(), first_row.clone())
		.put(METRICS_TABLE_ROWS_CF.to_vec(), LAST_ROW_CQ.to_vec(), last_row.clone())
}
