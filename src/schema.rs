//! Table and column metadata.
//!
//! Modeled as plain value types per Design Note "Cyclic table descriptor /
//! column back-reference": the descriptor owns its columns by value, and
//! `add_column` rebuilds the vector rather than mutating column
//! back-references in place.

use crate::err::Error;

/// The logical type of a column, as understood by the injected
/// [`crate::serializer::RowSerializer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalType {
	Varchar,
	Bigint,
	Boolean,
	Double,
	Date,
	/// An array of `element`. Source values of this type contribute one
	/// index cell per distinct element rather than one cell for the whole
	/// value.
	Array(&'static LogicalType),
}

impl LogicalType {
	/// The element type, if this is an array type.
	pub fn element_type(&self) -> Option<&'static LogicalType> {
		match self {
			LogicalType::Array(e) => Some(e),
			_ => None,
		}
	}

	pub fn is_array(&self) -> bool {
		matches!(self, LogicalType::Array(_))
	}
}

/// One column of a [`TableDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
	pub family: String,
	pub qualifier: String,
	pub logical_type: LogicalType,
	/// Whether this column's schema-time `indexed` flag is set (I4).
	pub indexed: bool,
	/// Whether this column holds the table's row-id (exactly one per table).
	pub is_row_id: bool,
}

impl ColumnDescriptor {
	/// The index column family for this column: `f "_" q` (spec §6).
	pub fn index_family(&self) -> Vec<u8> {
		index_family(&self.family, &self.qualifier)
	}
}

/// Byte concatenation `f || "_" || q`, the index column family for an
/// indexed source column (spec §6, GLOSSARY).
pub fn index_family(family: &str, qualifier: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(family.len() + 1 + qualifier.len());
	out.extend_from_slice(family.as_bytes());
	out.push(b'_');
	out.extend_from_slice(qualifier.as_bytes());
	out
}

/// A user table's schema and derived table names.
#[derive(Clone, Debug)]
pub struct TableDescriptor {
	/// The schema the table lives in ("default" if none is given explicitly).
	pub schema: String,
	pub table: String,
	columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
	pub fn new(schema: impl Into<String>, table: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Result<Self, Error> {
		let schema = schema.into();
		let table = table.into();
		let row_ids = columns.iter().filter(|c| c.is_row_id).count();
		if row_ids != 1 {
			return Err(Error::misconfiguration(format!(
				"table {schema}.{table} must have exactly one row-id column, found {row_ids}"
			)));
		}
		Ok(Self {
			schema,
			table,
			columns,
		})
	}

	/// A functional rebuild of the column vector with one column appended,
	/// per Design Note "ordinal-rewriting on `add_column`".
	pub fn add_column(&self, column: ColumnDescriptor) -> Result<Self, Error> {
		let mut columns = self.columns.clone();
		columns.push(column);
		Self::new(self.schema.clone(), self.table.clone(), columns)
	}

	pub fn columns(&self) -> &[ColumnDescriptor] {
		&self.columns
	}

	pub fn row_id_column(&self) -> &ColumnDescriptor {
		self.columns
			.iter()
			.find(|c| c.is_row_id)
			.expect("constructor guarantees exactly one row-id column")
	}

	pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
		self.columns.iter().filter(|c| c.indexed)
	}

	pub fn column(&self, family: &str, qualifier: &str) -> Option<&ColumnDescriptor> {
		self.columns.iter().find(|c| c.family == family && c.qualifier == qualifier)
	}

	/// `schema "." table` (bare `table` if schema is `default`) — spec §6.
	pub fn data_table(&self) -> String {
		qualified_name(&self.schema, &self.table)
	}

	/// The index table name: `data_table "_idx"`.
	pub fn index_table(&self) -> String {
		format!("{}_idx", self.data_table())
	}

	/// The metrics table name: `data_table "_idx_metrics"`.
	pub fn metrics_table(&self) -> String {
		format!("{}_idx_metrics", self.data_table())
	}

	/// Whether this table has any indexed column, i.e. whether the index and
	/// metrics tables exist at all (spec §3 "Lifecycle").
	pub fn has_index(&self) -> bool {
		self.indexed_columns().next().is_some()
	}

	/// For each indexed `(f, q)`, a locality group named `f_q` whose single
	/// member column family is `f_q` — applied to both the index and
	/// metrics tables (spec §4.C "Helpers (contractual)").
	pub fn locality_groups(&self) -> Vec<LocalityGroup> {
		self.indexed_columns()
			.map(|c| LocalityGroup {
				name: String::from_utf8_lossy(&c.index_family()).into_owned(),
				families: vec![c.index_family()],
			})
			.collect()
	}
}

fn qualified_name(schema: &str, table: &str) -> String {
	if schema == "default" {
		table.to_string()
	} else {
		format!("{schema}.{table}")
	}
}

/// A backend locality group: a name plus the column families stored
/// together under it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalityGroup {
	pub name: String,
	pub families: Vec<Vec<u8>>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row_id(name: &str) -> ColumnDescriptor {
		ColumnDescriptor {
			family: name.to_string(),
			qualifier: name.to_string(),
			logical_type: LogicalType::Varchar,
			indexed: false,
			is_row_id: true,
		}
	}

	#[test]
	fn qualified_names_drop_default_schema() {
		let t = TableDescriptor::new("default", "people", vec![row_id("id")]).unwrap();
		assert_eq!(t.data_table(), "people");
		assert_eq!(t.index_table(), "people_idx");
		assert_eq!(t.metrics_table(), "people_idx_metrics");

		let t = TableDescriptor::new("analytics", "people", vec![row_id("id")]).unwrap();
		assert_eq!(t.data_table(), "analytics.people");
	}

	#[test]
	fn requires_exactly_one_row_id_column() {
		assert!(TableDescriptor::new("default", "t", vec![]).is_err());
	}

	#[test]
	fn locality_groups_cover_indexed_columns_only() {
		let t = TableDescriptor::new(
			"default",
			"people",
			vec![
				row_id("id"),
				ColumnDescriptor {
					family: "age".into(),
					qualifier: "age".into(),
					logical_type: LogicalType::Bigint,
					indexed: true,
					is_row_id: false,
				},
				ColumnDescriptor {
					family: "bio".into(),
					qualifier: "bio".into(),
					logical_type: LogicalType::Varchar,
					indexed: false,
					is_row_id: false,
				},
			],
		)
		.unwrap();
		let groups = t.locality_groups();
		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].name, "age_age");
	}
}
