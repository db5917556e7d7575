#![cfg(feature = "kv-mem")]
//! An in-memory [`KvStore`] implementation.
//!
//! Sufficient to exercise every indexer and planner code path, including
//! simulated tablet boundaries and a server-side summing merge standing in
//! for the real backend's combiner iterator. Grounded on the teacher's
//! `kvs/mem/mod.rs` (a `Datastore`/`Transaction` pair wrapping an embedded
//! engine behind the common trait, with a `Drop`-time warning for unflushed
//! writers).

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};

use crate::cell::{Mutation, Row, ScannedCell};
use crate::cnf::CARDINALITY_CQ;
use crate::kv::api::{Auths, IteratorSetting, KvStore, StorageRange, TabletLocation, Writer, WriterConfig};
use crate::kv::Error;

type CellKey = (Row, Vec<u8>, Vec<u8>);

#[derive(Default)]
struct Table {
	cells: BTreeMap<CellKey, Vec<u8>>,
	/// Sorted ascending inclusive end-keys of each tablet, dividing the row
	/// space into `(boundary[i-1], boundary[i]]` ranges with the last
	/// tablet open-ended. Empty means "one tablet, the whole table".
	tablet_boundaries: Vec<Row>,
	/// Combiners attached via [`KvStore::attach_iterator`]. Only their
	/// presence is checked by this backend's merge function; see
	/// `DESIGN.md` for why summing is scoped to the cardinality qualifier.
	combiners: Vec<IteratorSetting>,
}

/// The crate's in-memory [`KvStore`] backend, used by its own test suite.
#[derive(Clone, Default)]
pub struct MemStore {
	inner: Arc<Mutex<BTreeMap<String, Table>>>,
}

impl MemStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Test/development helper: configure fixed tablet boundaries for
	/// `table`, simulating the backend's tablet-server assignment.
	pub fn set_tablet_boundaries(&self, table: &str, mut boundaries: Vec<Row>) {
		boundaries.sort();
		let mut tables = self.inner.lock().unwrap();
		tables.entry(table.to_string()).or_default().tablet_boundaries = boundaries;
	}

	fn merge_write(table: &mut Table, row: Row, family: Vec<u8>, qualifier: Vec<u8>, value: Vec<u8>) {
		let combiner_attached = !table.combiners.is_empty();
		let key = (row, family, qualifier.clone());
		if combiner_attached && qualifier == CARDINALITY_CQ {
			let existing = table.cells.get(&key).and_then(|v| std::str::from_utf8(v).ok()).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
			let delta = std::str::from_utf8(&value).ok().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
			table.cells.insert(key, (existing + delta).to_string().into_bytes());
		} else {
			table.cells.insert(key, value);
		}
	}
}

/// A buffered writer against one [`MemStore`] table.
pub struct MemWriter {
	store: MemStore,
	table: String,
	buffer: Vec<Mutation>,
	closed: bool,
}

impl MemWriter {
	fn drain(&mut self) {
		let mut tables = self.store.inner.lock().unwrap();
		let t = tables.entry(self.table.clone()).or_default();
		for m in self.buffer.drain(..) {
			for cell in m.cells {
				MemStore::merge_write(t, m.row.clone(), cell.family, cell.qualifier, cell.value);
			}
		}
	}
}

impl Drop for MemWriter {
	fn drop(&mut self) {
		if !self.closed && !self.buffer.is_empty() {
			warn!(table = %self.table, buffered = self.buffer.len(), "writer dropped with buffered mutations that were never flushed");
		}
	}
}

impl Writer for MemWriter {
	fn write(&mut self, mutation: Mutation) -> impl Future<Output = Result<(), Error>> + Send {
		self.buffer.push(mutation);
		async { Ok(()) }
	}

	fn flush(&mut self) -> impl Future<Output = Result<(), Error>> + Send {
		self.drain();
		async { Ok(()) }
	}

	fn close(mut self) -> impl Future<Output = Result<(), Error>> + Send {
		self.drain();
		self.closed = true;
		async { Ok(()) }
	}
}

impl KvStore for MemStore {
	type Writer = MemWriter;

	fn batch_writer(&self, table: &str, _cfg: WriterConfig) -> Self::Writer {
		MemWriter {
			store: self.clone(),
			table: table.to_string(),
			buffer: Vec::new(),
			closed: false,
		}
	}

	fn scan(&self, table: &str, range: &StorageRange, _auths: &Auths) -> impl Future<Output = Result<Vec<ScannedCell>, Error>> + Send {
		let tables = self.inner.lock().unwrap();
		let out = tables
			.get(table)
			.map(|t| {
				t.cells
					.iter()
					.filter(|((row, _, _), _)| range.contains_key(row))
					.map(|((row, family, qualifier), value)| ScannedCell {
						row: row.clone(),
						family: family.clone(),
						qualifier: qualifier.clone(),
						value: value.clone(),
					})
					.collect()
			})
			.unwrap_or_default();
		async { Ok(out) }
	}

	fn batch_scan(
		&self,
		table: &str,
		ranges: &[StorageRange],
		auths: &Auths,
		n_threads: usize,
	) -> impl Future<Output = Result<Vec<ScannedCell>, Error>> + Send {
		let this = self.clone();
		let table = table.to_string();
		let auths = auths.clone();
		let ranges = ranges.to_vec();
		let n_threads = n_threads.max(1);
		async move {
			let results: Vec<Result<Vec<ScannedCell>, Error>> = stream::iter(ranges.into_iter())
				.map(|r| {
					let this = this.clone();
					let table = table.clone();
					let auths = auths.clone();
					async move { this.scan(&table, &r, &auths).await }
				})
				.buffer_unordered(n_threads)
				.collect()
				.await;
			let mut out = Vec::new();
			for r in results {
				out.extend(r?);
			}
			Ok(out)
		}
	}

	fn split_range_by_tablets(&self, table: &str, range: &StorageRange) -> impl Future<Output = Result<Vec<StorageRange>, Error>> + Send {
		let tables = self.inner.lock().unwrap();
		let boundaries = tables.get(table).map(|t| t.tablet_boundaries.clone()).unwrap_or_default();
		drop(tables);
		let out = if boundaries.is_empty() {
			vec![range.clone()]
		} else {
			crate::kv::range::split_by_boundaries(range, &boundaries)
		};
		async { Ok(out) }
	}

	fn attach_iterator(&self, table: &str, setting: IteratorSetting) -> impl Future<Output = Result<(), Error>> + Send {
		let mut tables = self.inner.lock().unwrap();
		tables.entry(table.to_string()).or_default().combiners.push(setting);
		async { Ok(()) }
	}

	fn tablet_locations(&self, table: &str, key: Option<&[u8]>) -> impl Future<Output = Result<TabletLocation, Error>> + Send {
		let tables = self.inner.lock().unwrap();
		let loc = match tables.get(table) {
			None => TabletLocation::unknown(),
			Some(t) if t.tablet_boundaries.is_empty() => TabletLocation {
				host: "localhost".to_string(),
				port: 9997,
			},
			Some(t) => {
				let idx = match key {
					None => t.tablet_boundaries.len() - 1,
					Some(k) => t.tablet_boundaries.iter().position(|b| b.as_slice() >= k).unwrap_or(t.tablet_boundaries.len() - 1),
				};
				TabletLocation {
					host: "localhost".to_string(),
					port: 9997 + idx as u16,
				}
			}
		};
		async { Ok(loc) }
	}
}
