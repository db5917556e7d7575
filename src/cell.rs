//! The wire-level data model: a cell is a four-tuple `(row, family,
//! qualifier, value)`, and a mutation is a set of cells sharing one row-id,
//! committed atomically at the row level.

/// A row identifier, as raw ordered bytes.
pub type Row = Vec<u8>;
/// A column family, as raw bytes (for indexed columns this is `f "_" q`).
pub type Family = Vec<u8>;
/// A column qualifier, as raw bytes.
pub type Qualifier = Vec<u8>;
/// A cell value, as raw bytes. Index cells carry an empty value.
pub type Value = Vec<u8>;

/// One `(family, qualifier, value)` update within a [`Mutation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
	pub family: Family,
	pub qualifier: Qualifier,
	pub value: Value,
}

impl Cell {
	pub fn new(family: impl Into<Family>, qualifier: impl Into<Qualifier>, value: impl Into<Value>) -> Self {
		Self {
			family: family.into(),
			qualifier: qualifier.into(),
			value: value.into(),
		}
	}
}

/// A set of cell updates sharing one row, committed atomically at the row
/// level. This is the unit handed to [`crate::kv::Writer::write`] and to
/// [`crate::indexer::Indexer::index`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
	pub row: Row,
	pub cells: Vec<Cell>,
}

impl Mutation {
	pub fn new(row: impl Into<Row>) -> Self {
		Self {
			row: row.into(),
			cells: Vec::new(),
		}
	}

	pub fn put(mut self, family: impl Into<Family>, qualifier: impl Into<Qualifier>, value: impl Into<Value>) -> Self {
		self.cells.push(Cell::new(family, qualifier, value));
		self
	}
}

/// A single scanned cell, fully addressed (used as the result type of
/// [`crate::kv::KvStore::scan`] and [`crate::kv::KvStore::batch_scan`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedCell {
	pub row: Row,
	pub family: Family,
	pub qualifier: Qualifier,
	pub value: Value,
}
