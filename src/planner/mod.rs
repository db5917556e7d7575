//! The index-driven split planner: the read path that turns a predicate
//! into parallel scan work units (spec §4.D).
//!
//! Grounded on `core/src/idx/planner/mod.rs`/`plan.rs` (deciding between a
//! full table iterator and one or more index-backed plans, with a
//! `QueryPlannerParams`-style knobs struct) and `core/src/idx/planner/executor.rs`
//! (running per-index probes and combining their results) — adapted from
//! SurrealDB's AST-driven plan selection to this crate's purely numeric
//! cardinality-ratio algorithm: the inputs are already a [`Domain`] and a
//! list of [`ColumnConstraint`]s, so there is no expression tree to walk.

mod domain;
mod session;
mod split;

use std::collections::BTreeSet;
use std::ops::Bound;

use futures::stream::{self, StreamExt, TryStreamExt};

pub use domain::{ColumnConstraint, Domain, LogicalRange, RangeBound};
pub use session::Session;
pub use split::TabletSplitMetadata;

use crate::cnf::{CARDINALITY_CQ, METRICS_TABLE_ROWS_CF, METRICS_TABLE_ROW_ID, PLANNER_PROBE_CONCURRENCY};
use crate::err::Error;
use crate::kv::{Auths, KvStore, StorageRange};
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::serializer::RowSerializer;

/// Converts a predicate on `table` into a list of [`TabletSplitMetadata`],
/// each a preferred host plus the scan ranges to run in one task (spec
/// §4.D). Read-only and re-entrant: safe to call concurrently against the
/// same table from multiple callers (spec §5 "Planner concurrency").
pub async fn get_tablet_splits<K: KvStore, S: RowSerializer>(
	kv: &K,
	serializer: &S,
	session: &Session,
	table: &TableDescriptor,
	row_domain: Option<&Domain>,
	constraints: &[ColumnConstraint],
	auths: &Auths,
) -> Result<Vec<TabletSplitMetadata>, Error> {
	// Step 1: row-ID pushdown ranges.
	let row_ty = table.row_id_column().logical_type;
	let pushdown_ranges = if session.optimize_range_predicate_pushdown {
		match row_domain {
			Some(d) => d.to_storage_ranges(&row_ty, serializer)?,
			None => vec![StorageRange::unbounded()],
		}
	} else {
		vec![StorageRange::unbounded()]
	};

	// Step 2: index decision.
	let indexed_constraints = resolve_indexed_constraints(table, constraints)?;
	let mut candidate_ranges = pushdown_ranges.clone();

	if session.secondary_index_enabled && !indexed_constraints.is_empty() {
		let metrics_table = table.metrics_table();
		let index_table = table.index_table();

		// Step 3: cardinality probe.
		let n = read_global_row_count(kv, &metrics_table, auths).await?;
		let cardinalities = probe_cardinalities(kv, serializer, &metrics_table, &indexed_constraints, auths).await?;

		let mut sorted: Vec<(&ColumnConstraint, &ColumnDescriptor, u64)> = indexed_constraints
			.into_iter()
			.zip(cardinalities)
			.map(|((c, col), card)| (c, col, card))
			.collect();
		sorted.sort_by_key(|(_, _, card)| *card);

		if sorted[0].2 == 0 {
			trace!(table = %table.data_table(), "planner short-circuit: a constraint's cardinality is zero");
			return Ok(Vec::new());
		}

		// Step 4: intersect or single-probe, then the ratio gate.
		let min_card = sorted[0].2;
		let ratio_to_n = ratio(min_card, n);
		let row_ids = if ratio_to_n > session.lowest_cardinality_threshold {
			trace!(table = %table.data_table(), ratio_to_n, "planner: intersection mode");
			intersect_mode(kv, &index_table, serializer, &sorted, &pushdown_ranges, auths).await?
		} else {
			trace!(table = %table.data_table(), ratio_to_n, "planner: single-probe mode");
			probe_row_ids(kv, &index_table, serializer, sorted[0].1, &sorted[0].0.domain, &pushdown_ranges, auths).await?
		};

		let m = row_ids.len() as u64;
		let result_ratio = ratio(m, n);
		candidate_ranges = if result_ratio < session.index_ratio {
			trace!(table = %table.data_table(), result_ratio, "planner: using per-row point ranges");
			row_ids.into_iter().map(StorageRange::point).collect()
		} else {
			trace!(table = %table.data_table(), result_ratio, "planner: index probe not selective enough, falling back to pushdown ranges");
			pushdown_ranges.clone()
		};
	}

	// Step 5: tablet splitting.
	if session.optimize_range_splits {
		let mut split_ranges = Vec::with_capacity(candidate_ranges.len());
		for r in &candidate_ranges {
			split_ranges.extend(kv.split_range_by_tablets(&table.data_table(), r).await?);
		}
		candidate_ranges = split_ranges;
	}

	// Step 6: artificial splits.
	if session.num_artificial_splits > 0 {
		if let Some((first, last)) = crate::indexer::min_max_row_ids(kv, &table.metrics_table(), auths).await? {
			candidate_ranges = candidate_ranges
				.iter()
				.flat_map(|r| split::bisect_range(r, &first, &last, session.num_artificial_splits))
				.collect();
		}
	}

	// Step 7: binning.
	let chunks = split::shuffle_and_bin(candidate_ranges, session.ranges_per_split);
	let mut out = Vec::with_capacity(chunks.len());
	for chunk in chunks {
		let key = chunk.first().and_then(|r| match &r.start {
			Bound::Included(v) | Bound::Excluded(v) => Some(v.as_slice()),
			Bound::Unbounded => None,
		});
		let location = kv.tablet_locations(&table.data_table(), key).await?;
		out.push(TabletSplitMetadata {
			preferred_host: location.to_string(),
			ranges: chunk,
		});
	}
	Ok(out)
}

fn resolve_indexed_constraints<'a>(table: &'a TableDescriptor, constraints: &'a [ColumnConstraint]) -> Result<Vec<(&'a ColumnConstraint, &'a ColumnDescriptor)>, Error> {
	constraints
		.iter()
		.filter(|c| c.indexed)
		.map(|c| {
			let col = table
				.column(&c.family, &c.qualifier)
				.ok_or_else(|| Error::misconfiguration(format!("constraint references unknown column {}.{}", c.family, c.qualifier)))?;
			if !col.indexed {
				return Err(Error::misconfiguration(format!("constraint references unindexed column {}.{}", c.family, c.qualifier)));
			}
			Ok((c, col))
		})
		.collect()
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
	if denominator == 0 {
		0.0
	} else {
		numerator as f64 / denominator as f64
	}
}

fn parse_ascii_decimal(value: &[u8]) -> Result<u64, Error> {
	std::str::from_utf8(value)
		.ok()
		.and_then(|s| s.parse().ok())
		.ok_or_else(|| Error::invariant(format!("expected an ASCII decimal cardinality value, found {value:?}")))
}

async fn read_global_row_count<K: KvStore>(kv: &K, metrics_table: &str, auths: &Auths) -> Result<u64, Error> {
	let range = StorageRange::point(METRICS_TABLE_ROW_ID.to_vec());
	let cells = kv.scan(metrics_table, &range, auths).await?;
	match cells.iter().find(|c| c.family == METRICS_TABLE_ROWS_CF && c.qualifier == CARDINALITY_CQ) {
		Some(c) => parse_ascii_decimal(&c.value),
		None => Ok(0),
	}
}

/// Sums the `___card___` values of `col` over the storage-ranges induced by
/// `domain` (spec §4.D step 3).
async fn probe_cardinality<K: KvStore, S: RowSerializer>(kv: &K, metrics_table: &str, serializer: &S, col: &ColumnDescriptor, domain: &Domain, auths: &Auths) -> Result<u64, Error> {
	let ty = col.logical_type.element_type().copied().unwrap_or(col.logical_type);
	let ranges = domain.to_storage_ranges(&ty, serializer)?;
	let family_q = col.index_family();
	let mut total = 0u64;
	for r in &ranges {
		let cells = kv.scan(metrics_table, r, auths).await?;
		for cell in cells {
			if cell.family == family_q && cell.qualifier == CARDINALITY_CQ {
				total += parse_ascii_decimal(&cell.value)?;
			}
		}
	}
	Ok(total)
}

/// Runs [`probe_cardinality`] for every indexed constraint, bounded to
/// [`PLANNER_PROBE_CONCURRENCY`] concurrent probes (spec §5 "per-column
/// index probes MAY be parallel"), preserving input order in the result.
async fn probe_cardinalities<K: KvStore, S: RowSerializer>(
	kv: &K,
	serializer: &S,
	metrics_table: &str,
	cols: &[(&ColumnConstraint, &ColumnDescriptor)],
	auths: &Auths,
) -> Result<Vec<u64>, Error> {
	let mut indexed: Vec<(usize, u64)> = stream::iter(cols.iter().enumerate())
		.map(|(i, (c, col))| async move {
			let count = probe_cardinality(kv, metrics_table, serializer, col, &c.domain, auths).await?;
			Ok::<_, Error>((i, count))
		})
		.buffer_unordered(*PLANNER_PROBE_CONCURRENCY)
		.try_collect()
		.await?;
	indexed.sort_by_key(|(i, _)| *i);
	Ok(indexed.into_iter().map(|(_, count)| count).collect())
}

/// Scans `T_idx` for `col`'s index family over `domain`'s ranges, returning
/// the set of source row-IDs (the cells' qualifiers) whose row-ID also lies
/// in at least one of `pushdown_ranges` (spec §4.D step 4).
async fn probe_row_ids<K: KvStore, S: RowSerializer>(
	kv: &K,
	index_table: &str,
	serializer: &S,
	col: &ColumnDescriptor,
	domain: &Domain,
	pushdown_ranges: &[StorageRange],
	auths: &Auths,
) -> Result<BTreeSet<Vec<u8>>, Error> {
	let ty = col.logical_type.element_type().copied().unwrap_or(col.logical_type);
	let ranges = domain.to_storage_ranges(&ty, serializer)?;
	let family_q = col.index_family();
	let mut out = BTreeSet::new();
	for r in &ranges {
		let cells = kv.scan(index_table, r, auths).await?;
		for cell in cells {
			if cell.family == family_q && pushdown_ranges.iter().any(|pr| pr.contains_key(&cell.qualifier)) {
				out.insert(cell.qualifier);
			}
		}
	}
	Ok(out)
}

/// Intersection-mode probing: every indexed constraint is probed (bounded
/// parallel, as in [`probe_cardinalities`]) and the resulting row-ID sets
/// are intersected (spec §4.D step 4).
async fn intersect_mode<K: KvStore, S: RowSerializer>(
	kv: &K,
	index_table: &str,
	serializer: &S,
	sorted: &[(&ColumnConstraint, &ColumnDescriptor, u64)],
	pushdown_ranges: &[StorageRange],
	auths: &Auths,
) -> Result<BTreeSet<Vec<u8>>, Error> {
	let sets: Vec<BTreeSet<Vec<u8>>> = stream::iter(sorted.iter())
		.map(|(constraint, col, _)| probe_row_ids(kv, index_table, serializer, col, &constraint.domain, pushdown_ranges, auths))
		.buffer_unordered(*PLANNER_PROBE_CONCURRENCY)
		.try_collect()
		.await?;
	let mut sets = sets.into_iter();
	let first = sets.next().unwrap_or_default();
	Ok(sets.fold(first, |acc, s| acc.intersection(&s).cloned().collect()))
}
