//! The secondary-index engine: the write path that keeps `T_idx` and
//! `T_idx_metrics` consistent with `T` for one user table (spec §4.C).
//!
//! Grounded on `core/src/doc/index.rs` (`IndexOperation`, dispatching per
//! index kind and building values from a changed document) and
//! `core/src/kvs/index.rs` (`Building`/`IndexBuilder`, draining an append
//! queue while tracking build status) — adapted from "index one document
//! against a `DefineIndexStatement`" to "index one mutation against every
//! indexed column of a table, with per-batch counters flushed separately".

mod keys;
mod metrics;

use std::collections::{HashMap, HashSet};

use crate::cell::{Mutation, Row};
use crate::cnf::{CARDINALITY_CQ, FIRST_ROW_CQ, LAST_ROW_CQ, METRICS_TABLE_ROWS_CF, METRICS_TABLE_ROW_ID};
use crate::err::Error;
use crate::kv::{Auths, KvStore, StorageRange, Writer, WriterConfig};
use crate::schema::{ColumnDescriptor, LocalityGroup, LogicalType, TableDescriptor};
use crate::serializer::RowSerializer;
use metrics::BatchMetrics;

/// Maintains `T_idx` and `T_idx_metrics` for one user table as mutations are
/// indexed (spec §4.C). Single-writer, synchronous: `index`, `flush`, and
/// `close` are not safe to call concurrently on the same instance (spec §5).
pub struct Indexer<K: KvStore, S: RowSerializer> {
	table: TableDescriptor,
	serializer: S,
	indexed: HashMap<(Vec<u8>, Vec<u8>), ColumnDescriptor>,
	data_writer: K::Writer,
	index_writer: Option<K::Writer>,
	metrics_writer: Option<K::Writer>,
	batch: BatchMetrics,
}

impl<K: KvStore, S: RowSerializer> Indexer<K, S> {
	/// Computes the indexed `(family, qualifier)` set once and opens the
	/// three backing writers with a shared `writer_cfg` (spec §4.C
	/// "Construction"). `table`'s array-typed indexed columns must not
	/// themselves carry an array element type; nested arrays are rejected
	/// as a misconfiguration rather than producing a serializer panic later.
	pub fn new(kv: &K, table: TableDescriptor, serializer: S, writer_cfg: WriterConfig) -> Result<Self, Error> {
		for col in table.indexed_columns() {
			if let LogicalType::Array(elem) = col.logical_type {
				if matches!(elem, LogicalType::Array(_)) {
					return Err(Error::misconfiguration(format!(
						"column {}.{} is an array of arrays, which is not supported",
						col.family, col.qualifier
					)));
				}
			}
		}

		let indexed: HashMap<(Vec<u8>, Vec<u8>), ColumnDescriptor> = table
			.indexed_columns()
			.map(|c| ((c.family.clone().into_bytes(), c.qualifier.clone().into_bytes()), c.clone()))
			.collect();

		let data_writer = kv.batch_writer(&table.data_table(), writer_cfg.clone());
		let (index_writer, metrics_writer) = if table.has_index() {
			(
				Some(kv.batch_writer(&table.index_table(), writer_cfg.clone())),
				Some(kv.batch_writer(&table.metrics_table(), writer_cfg)),
			)
		} else {
			(None, None)
		};

		Ok(Self {
			table,
			serializer,
			indexed,
			data_writer,
			index_writer,
			metrics_writer,
			batch: BatchMetrics::default(),
		})
	}

	/// Indexes one mutation (spec §4.C "Per-mutation operation"): writes it
	/// to the data writer unchanged, folds its row-ID into the per-batch row
	/// counter and min/max, and for each indexed column update emits one
	/// `T_idx` cell per distinct value (or per distinct array element) plus
	/// the matching per-batch cardinality increment.
	pub async fn index(&mut self, mutation: Mutation) -> Result<(), Error> {
		self.batch.observe_row(&mutation.row);

		// Pass 1: resolve which index cells this mutation yields. Borrows
		// `self.indexed`/`self.serializer` only; collected into an owned
		// list so pass 2 can take `&mut self.index_writer`/`self.batch`
		// without a borrow conflict.
		let mut to_emit: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
		for cell in &mutation.cells {
			let key = (cell.family.clone(), cell.qualifier.clone());
			let Some(col) = self.indexed.get(&key) else {
				continue;
			};
			let family_q = col.index_family();
			match col.logical_type {
				LogicalType::Array(elem_ty) => {
					let elements = self.serializer.array_elements(elem_ty, &cell.value)?;
					let mut seen = HashSet::new();
					for elem in elements {
						if seen.insert(elem.clone()) {
							to_emit.push((family_q.clone(), elem));
						}
					}
				}
				_ => to_emit.push((family_q, cell.value.clone())),
			}
		}

		for (family_q, value) in &to_emit {
			let writer = self
				.index_writer
				.as_mut()
				.expect("a non-empty `to_emit` implies at least one indexed column, which implies an index writer");
			writer.write(keys::index_mutation(value, family_q, &mutation.row)).await?;
			self.batch.increment(family_q.clone(), value.clone());
		}

		self.data_writer.write(mutation).await?;
		Ok(())
	}

	/// Drains the data and index writers, then builds and drains the
	/// metrics mutations from the in-memory counters and the running
	/// first/last/count triple, then resets the per-batch cardinality
	/// counters (spec §4.C "`flush()` semantics"). `first_row`/`last_row`
	/// are the global min/max over the `Indexer`'s whole lifetime, not just
	/// this batch, and are re-emitted in full on every flush since their
	/// qualifiers are last-write-wins rather than summed — only
	/// `cardinalities`/`row_count` are batch-local and get cleared. Data and
	/// index are durable before any metrics mutation is issued, so a crash
	/// mid-flush can only under-count, never over-count, metrics relative to
	/// index contents.
	pub async fn flush(&mut self) -> Result<(), Error> {
		self.data_writer.flush().await?;
		if let Some(w) = self.index_writer.as_mut() {
			w.flush().await?;
		}

		let row_count = self.batch.row_count;
		if let Some(w) = self.metrics_writer.as_mut() {
			if !self.batch.is_empty() {
				for ((family_q, value), count) in self.batch.cardinalities.drain() {
					w.write(keys::cardinality_mutation(&value, &family_q, count)).await?;
				}
				let first_row = self.batch.first_row.clone().expect("row_count > 0 implies a first row was observed");
				let last_row = self.batch.last_row.clone().expect("row_count > 0 implies a last row was observed");
				w.write(keys::sentinel_mutation(row_count, &first_row, &last_row)).await?;
			}
			w.flush().await?;
		}

		debug!(table = %self.table.data_table(), rows = row_count, "flushed indexer batch");
		self.batch.reset();
		Ok(())
	}

	/// A final `flush`, then closes all three writers (spec §4.C
	/// "`close()`").
	pub async fn close(mut self) -> Result<(), Error> {
		if let Err(err) = self.flush().await {
			warn!(
				table = %self.table.data_table(),
				rows = self.batch.row_count,
				%err,
				"close()'s final flush failed to drain the per-batch counters"
			);
			return Err(err);
		}
		self.data_writer.close().await?;
		if let Some(w) = self.index_writer {
			w.close().await?;
		}
		if let Some(w) = self.metrics_writer {
			w.close().await?;
		}
		Ok(())
	}

	/// For each indexed `(f, q)`, a locality group named `f_q` whose single
	/// column family is `f_q`, applied to both `T_idx` and `T_idx_metrics`
	/// (spec §4.C "Helpers (contractual)").
	pub fn locality_groups(&self) -> Vec<LocalityGroup> {
		self.table.locality_groups()
	}
}

/// Reads the two sentinel metric cells of `metrics_table` and returns
/// `(first_row, last_row)` as raw bytes, or `None` if the table has never
/// been indexed into (spec §4.C "Helpers (contractual)" — used by the
/// planner to synthesize artificial splits).
pub(crate) async fn min_max_row_ids<K: KvStore>(kv: &K, metrics_table: &str, auths: &Auths) -> Result<Option<(Row, Row)>, Error> {
	let range = StorageRange::point(METRICS_TABLE_ROW_ID.to_vec());
	let cells = kv.scan(metrics_table, &range, auths).await?;
	let first = cells
		.iter()
		.find(|c| c.family == METRICS_TABLE_ROWS_CF && c.qualifier == FIRST_ROW_CQ)
		.map(|c| c.value.clone());
	let last = cells
		.iter()
		.find(|c| c.family == METRICS_TABLE_ROWS_CF && c.qualifier == LAST_ROW_CQ)
		.map(|c| c.value.clone());
	Ok(first.zip(last))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kv::mem::MemStore;
	use crate::schema::ColumnDescriptor;
	use crate::serializer::StandardSerializer;

	/// A [`KvStore`] wrapping [`MemStore`] whose writer against one named
	/// table fails every `flush`/`close`, without draining its buffer —
	/// used to exercise `Indexer::close`'s error path.
	#[derive(Clone)]
	struct FlakyStore {
		inner: MemStore,
		fail_table: String,
	}

	struct FlakyWriter {
		inner: crate::kv::mem::MemWriter,
		fail: bool,
	}

	impl Writer for FlakyWriter {
		fn write(&mut self, mutation: Mutation) -> impl std::future::Future<Output = Result<(), crate::kv::Error>> + Send {
			self.inner.write(mutation)
		}

		fn flush(&mut self) -> impl std::future::Future<Output = Result<(), crate::kv::Error>> + Send {
			let fail = self.fail;
			let inner_flush = self.inner.flush();
			async move {
				if fail {
					Err(crate::kv::Error::Backend("simulated backend fault".into()))
				} else {
					inner_flush.await
				}
			}
		}

		fn close(self) -> impl std::future::Future<Output = Result<(), crate::kv::Error>> + Send {
			let fail = self.fail;
			let inner_close = self.inner.close();
			async move {
				if fail {
					Err(crate::kv::Error::Backend("simulated backend fault".into()))
				} else {
					inner_close.await
				}
			}
		}
	}

	impl KvStore for FlakyStore {
		type Writer = FlakyWriter;

		fn batch_writer(&self, table: &str, cfg: WriterConfig) -> Self::Writer {
			FlakyWriter {
				inner: self.inner.batch_writer(table, cfg),
				fail: table == self.fail_table,
			}
		}

		fn scan(
			&self,
			table: &str,
			range: &StorageRange,
			auths: &Auths,
		) -> impl std::future::Future<Output = Result<Vec<crate::cell::ScannedCell>, crate::kv::Error>> + Send {
			self.inner.scan(table, range, auths)
		}

		fn batch_scan(
			&self,
			table: &str,
			ranges: &[StorageRange],
			auths: &Auths,
			n_threads: usize,
		) -> impl std::future::Future<Output = Result<Vec<crate::cell::ScannedCell>, crate::kv::Error>> + Send {
			self.inner.batch_scan(table, ranges, auths, n_threads)
		}

		fn split_range_by_tablets(&self, table: &str, range: &StorageRange) -> impl std::future::Future<Output = Result<Vec<StorageRange>, crate::kv::Error>> + Send {
			self.inner.split_range_by_tablets(table, range)
		}

		fn attach_iterator(&self, table: &str, setting: crate::kv::IteratorSetting) -> impl std::future::Future<Output = Result<(), crate::kv::Error>> + Send {
			self.inner.attach_iterator(table, setting)
		}

		fn tablet_locations(&self, table: &str, key: Option<&[u8]>) -> impl std::future::Future<Output = Result<crate::kv::TabletLocation, crate::kv::Error>> + Send {
			self.inner.tablet_locations(table, key)
		}
	}

	fn people_table() -> TableDescriptor {
		TableDescriptor::new(
			"default",
			"people",
			vec![
				ColumnDescriptor {
					family: "id".into(),
					qualifier: "id".into(),
					logical_type: LogicalType::Varchar,
					indexed: false,
					is_row_id: true,
				},
				ColumnDescriptor {
					family: "age".into(),
					qualifier: "age".into(),
					logical_type: LogicalType::Bigint,
					indexed: true,
					is_row_id: false,
				},
				ColumnDescriptor {
					family: "firstname".into(),
					qualifier: "firstname".into(),
					logical_type: LogicalType::Varchar,
					indexed: true,
					is_row_id: false,
				},
				ColumnDescriptor {
					family: "arr".into(),
					qualifier: "arr".into(),
					logical_type: LogicalType::Array(&LogicalType::Varchar),
					indexed: true,
					is_row_id: false,
				},
			],
		)
		.unwrap()
	}

	/// Scenario S1: single-row indexing.
	#[test_log::test(tokio::test)]
	async fn single_row_indexing_produces_one_index_cell_per_distinct_element() {
		let kv = MemStore::new();
		kv.attach_iterator("people_idx_metrics", crate::kv::IteratorSetting::summing_combiner())
			.await
			.unwrap();
		let table = people_table();
		let serializer = StandardSerializer;
		let mut indexer = Indexer::new(&kv, table, serializer, WriterConfig::default()).unwrap();

		let arr = serializer
			.encode_array(
				&LogicalType::Varchar,
				&[
					crate::serializer::LogicalValue::Varchar("abc".into()),
					crate::serializer::LogicalValue::Varchar("def".into()),
					crate::serializer::LogicalValue::Varchar("ghi".into()),
				],
			)
			.unwrap();
		let mutation = Mutation::new(b"row1".to_vec())
			.put("age", "age", serializer.encode(&LogicalType::Bigint, &crate::serializer::LogicalValue::Bigint(27)).unwrap())
			.put("firstname", "firstname", serializer.encode(&LogicalType::Varchar, &crate::serializer::LogicalValue::Varchar("alice".into())).unwrap())
			.put("arr", "arr", arr);
		indexer.index(mutation).await.unwrap();
		indexer.flush().await.unwrap();

		let idx_cells = kv.scan("people_idx", &StorageRange::unbounded(), &Auths::default()).await.unwrap();
		assert_eq!(idx_cells.len(), 5);

		let metrics_cells = kv.scan("people_idx_metrics", &StorageRange::unbounded(), &Auths::default()).await.unwrap();
		let sentinel_card = metrics_cells
			.iter()
			.find(|c| c.row == METRICS_TABLE_ROW_ID && c.qualifier == CARDINALITY_CQ)
			.unwrap();
		assert_eq!(sentinel_card.value, b"1");
		let sentinel_first = metrics_cells.iter().find(|c| c.qualifier == FIRST_ROW_CQ).unwrap();
		assert_eq!(sentinel_first.value, b"row1");
	}

	/// Scenario S2: two rows with an overlapping array element.
	#[test_log::test(tokio::test)]
	async fn second_row_updates_cardinalities_and_sentinel_range() {
		let kv = MemStore::new();
		kv.attach_iterator("people_idx_metrics", crate::kv::IteratorSetting::summing_combiner())
			.await
			.unwrap();
		let serializer = StandardSerializer;
		let mut indexer = Indexer::new(&kv, people_table(), serializer, WriterConfig::default()).unwrap();

		let arr1 = serializer
			.encode_array(
				&LogicalType::Varchar,
				&[
					crate::serializer::LogicalValue::Varchar("abc".into()),
					crate::serializer::LogicalValue::Varchar("def".into()),
					crate::serializer::LogicalValue::Varchar("ghi".into()),
				],
			)
			.unwrap();
		indexer
			.index(
				Mutation::new(b"row1".to_vec())
					.put("age", "age", serializer.encode(&LogicalType::Bigint, &crate::serializer::LogicalValue::Bigint(27)).unwrap())
					.put("firstname", "firstname", serializer.encode(&LogicalType::Varchar, &crate::serializer::LogicalValue::Varchar("alice".into())).unwrap())
					.put("arr", "arr", arr1),
			)
			.await
			.unwrap();
		indexer.flush().await.unwrap();

		let arr2 = serializer
			.encode_array(
				&LogicalType::Varchar,
				&[
					crate::serializer::LogicalValue::Varchar("ghi".into()),
					crate::serializer::LogicalValue::Varchar("mno".into()),
					crate::serializer::LogicalValue::Varchar("abc".into()),
				],
			)
			.unwrap();
		indexer
			.index(
				Mutation::new(b"row2".to_vec())
					.put("age", "age", serializer.encode(&LogicalType::Bigint, &crate::serializer::LogicalValue::Bigint(27)).unwrap())
					.put("firstname", "firstname", serializer.encode(&LogicalType::Varchar, &crate::serializer::LogicalValue::Varchar("bob".into())).unwrap())
					.put("arr", "arr", arr2),
			)
			.await
			.unwrap();
		indexer.close().await.unwrap();

		let idx_cells = kv.scan("people_idx", &StorageRange::unbounded(), &Auths::default()).await.unwrap();
		assert_eq!(idx_cells.len(), 10);

		let metrics_cells = kv.scan("people_idx_metrics", &StorageRange::unbounded(), &Auths::default()).await.unwrap();
		let sentinel_card = metrics_cells
			.iter()
			.find(|c| c.row == METRICS_TABLE_ROW_ID && c.qualifier == CARDINALITY_CQ)
			.unwrap();
		assert_eq!(sentinel_card.value, b"2");
		let sentinel_last = metrics_cells.iter().find(|c| c.qualifier == LAST_ROW_CQ).unwrap();
		assert_eq!(sentinel_last.value, b"row2");
		// I3/P4 across multiple flushes: the first flush (after row1) must
		// not be forgotten by the second (via close(), after row2) — the
		// sentinel's first_row must still be "row1", not reset to "row2".
		let sentinel_first = metrics_cells.iter().find(|c| c.qualifier == FIRST_ROW_CQ).unwrap();
		assert_eq!(sentinel_first.value, b"row1");

		let age_card = metrics_cells.iter().find(|c| c.row == serializer.encode(&LogicalType::Bigint, &crate::serializer::LogicalValue::Bigint(27)).unwrap()).unwrap();
		assert_eq!(age_card.value, b"2");
	}

	#[test_log::test(tokio::test)]
	async fn unindexed_table_writes_data_only() {
		let kv = MemStore::new();
		let table = TableDescriptor::new(
			"default",
			"plain",
			vec![ColumnDescriptor {
				family: "id".into(),
				qualifier: "id".into(),
				logical_type: LogicalType::Varchar,
				indexed: false,
				is_row_id: true,
			}],
		)
		.unwrap();
		let mut indexer = Indexer::new(&kv, table, StandardSerializer, WriterConfig::default()).unwrap();
		indexer.index(Mutation::new(b"row1".to_vec())).await.unwrap();
		indexer.close().await.unwrap();

		let idx_cells = kv.scan("plain_idx", &StorageRange::unbounded(), &Auths::default()).await.unwrap();
		assert!(idx_cells.is_empty());
	}

	#[test_log::test(tokio::test)]
	async fn rejects_nested_array_columns() {
		let kv = MemStore::new();
		let table = TableDescriptor::new(
			"default",
			"bad",
			vec![
				ColumnDescriptor {
					family: "id".into(),
					qualifier: "id".into(),
					logical_type: LogicalType::Varchar,
					indexed: false,
					is_row_id: true,
				},
				ColumnDescriptor {
					family: "nested".into(),
					qualifier: "nested".into(),
					logical_type: LogicalType::Array(&LogicalType::Array(&LogicalType::Varchar)),
					indexed: true,
					is_row_id: false,
				},
			],
		)
		.unwrap();
		assert!(Indexer::new(&kv, table, StandardSerializer, WriterConfig::default()).is_err());
	}

	/// A normal `index(); close()` sequence — with nothing ever having
	/// failed — must not warn: the per-batch counters it sees before
	/// flushing are simply this call's own pending work, not leftovers from
	/// an earlier failed flush.
	#[test_log::test(tokio::test)]
	async fn close_after_normal_indexing_succeeds_without_a_failed_flush() {
		let kv = MemStore::new();
		kv.attach_iterator("people_idx_metrics", crate::kv::IteratorSetting::summing_combiner()).await.unwrap();
		let mut indexer = Indexer::new(&kv, people_table(), StandardSerializer, WriterConfig::default()).unwrap();
		indexer.index(Mutation::new(b"row1".to_vec())).await.unwrap();
		indexer.close().await.unwrap();
	}

	/// `close()`'s warning fires only when its own final flush fails to
	/// drain the counters, not merely because a batch is pending.
	#[test_log::test(tokio::test)]
	async fn close_surfaces_a_failed_final_flush_and_leaves_counters_undrained() {
		let inner = MemStore::new();
		let table = people_table();
		let kv = FlakyStore {
			inner,
			fail_table: table.metrics_table(),
		};
		let mut indexer = Indexer::new(&kv, table, StandardSerializer, WriterConfig::default()).unwrap();
		indexer
			.index(Mutation::new(b"row1".to_vec()).put("age", "age", StandardSerializer.encode(&LogicalType::Bigint, &crate::serializer::LogicalValue::Bigint(1)).unwrap()))
			.await
			.unwrap();

		let err = indexer.close().await;
		assert!(err.is_err(), "close() must surface the metrics writer's flush failure");
	}
}
