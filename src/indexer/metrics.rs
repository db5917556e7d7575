//! The per-`Indexer` batch counters, per Design Note "Global mutable state"
//! — never ambient, never shared. `cardinalities`/`row_count` are reset on
//! every `flush` (they are summed server-side by the combiner, so only the
//! per-batch delta needs to be emitted); `first_row`/`last_row` are not —
//! those qualifiers are last-write-wins, so the indexer itself must keep
//! carrying the running min/max across flushes and re-emit it in full every
//! time, or a later flush's sentinel write would erase an earlier flush's
//! range (I3, P4).

use std::collections::HashMap;

use crate::cell::Row;

/// One index key's per-batch cardinality delta, keyed by `(index family,
/// indexed value)`.
type CardinalityKey = (Vec<u8>, Vec<u8>);

/// Counters accumulated since the last `flush`, plus the running
/// `first_row`/`last_row` accumulated over the `Indexer`'s whole lifetime.
/// `cardinalities`/`row_count` are reset in place by [`BatchMetrics::reset`]
/// rather than reallocated, so a caller holding a `&mut Indexer` across a
/// flush sees the same map identity; `first_row`/`last_row` survive `reset`.
#[derive(Default)]
pub(crate) struct BatchMetrics {
	pub cardinalities: HashMap<CardinalityKey, u64>,
	pub row_count: u64,
	pub first_row: Option<Row>,
	pub last_row: Option<Row>,
}

impl BatchMetrics {
	/// Folds one mutation's row-ID into the batch's row counter and
	/// lexicographic min/max (spec §4.C step 2).
	pub fn observe_row(&mut self, row: &Row) {
		self.row_count += 1;
		let is_new_first = match &self.first_row {
			None => true,
			Some(f) => row < f,
		};
		if is_new_first {
			self.first_row = Some(row.clone());
		}
		let is_new_last = match &self.last_row {
			None => true,
			Some(l) => row > l,
		};
		if is_new_last {
			self.last_row = Some(row.clone());
		}
	}

	/// Increments the per-batch cardinality counter for one index key (spec
	/// §4.C step 3's `metrics[iv][f_q]`).
	pub fn increment(&mut self, family_q: Vec<u8>, value: Vec<u8>) {
		*self.cardinalities.entry((family_q, value)).or_insert(0) += 1;
	}

	pub fn is_empty(&self) -> bool {
		self.row_count == 0
	}

	/// Clears the per-batch cardinality counters and row count after a
	/// successful flush. `first_row`/`last_row` are the running global
	/// min/max and are never cleared here (see module docs).
	pub fn reset(&mut self) {
		self.cardinalities = HashMap::new();
		self.row_count = 0;
	}
}
