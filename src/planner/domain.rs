//! Logical predicates and the range-translation rules that turn them into
//! storage ranges (spec §4.D "Range translation", "Containment test").

use std::ops::Bound;

use crate::err::Error;
use crate::kv::StorageRange;
use crate::schema::LogicalType;
use crate::serializer::{LogicalValue, RowSerializer};

/// One endpoint of a [`LogicalRange`]: unbounded, closed (`EXACTLY`), or
/// open.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeBound {
	Unbounded,
	Exactly(LogicalValue),
	Open(LogicalValue),
}

/// A single contiguous logical range over one column's type. A single value
/// `v` is `{ start: Exactly(v), end: Exactly(v) }`; a one-sided range leaves
/// the open end `Unbounded` (spec §4.D "Range translation").
#[derive(Clone, Debug, PartialEq)]
pub struct LogicalRange {
	pub start: RangeBound,
	pub end: RangeBound,
}

impl LogicalRange {
	pub fn unbounded() -> Self {
		Self {
			start: RangeBound::Unbounded,
			end: RangeBound::Unbounded,
		}
	}

	pub fn point(value: LogicalValue) -> Self {
		Self {
			start: RangeBound::Exactly(value.clone()),
			end: RangeBound::Exactly(value),
		}
	}

	/// Translates this range into a [`StorageRange`] by encoding each
	/// bounded endpoint through `serializer` and preserving its open/closed
	/// kind (spec §4.D "Range translation").
	pub fn to_storage_range<S: RowSerializer>(&self, ty: &LogicalType, serializer: &S) -> Result<StorageRange, Error> {
		Ok(StorageRange {
			start: encode_bound(&self.start, ty, serializer)?,
			end: encode_bound(&self.end, ty, serializer)?,
		})
	}
}

fn encode_bound<S: RowSerializer>(bound: &RangeBound, ty: &LogicalType, serializer: &S) -> Result<Bound<Vec<u8>>, Error> {
	Ok(match bound {
		RangeBound::Unbounded => Bound::Unbounded,
		RangeBound::Exactly(v) => Bound::Included(serializer.encode(ty, v)?),
		RangeBound::Open(v) => Bound::Excluded(serializer.encode(ty, v)?),
	})
}

/// A disjunction of [`LogicalRange`]s over one column's type — the domain
/// `D`/`D_i` of spec §4.D.
#[derive(Clone, Debug, PartialEq)]
pub struct Domain(pub Vec<LogicalRange>);

impl Domain {
	pub fn unbounded() -> Self {
		Self(vec![LogicalRange::unbounded()])
	}

	pub fn single(value: LogicalValue) -> Self {
		Self(vec![LogicalRange::point(value)])
	}

	pub fn to_storage_ranges<S: RowSerializer>(&self, ty: &LogicalType, serializer: &S) -> Result<Vec<StorageRange>, Error> {
		self.0.iter().map(|r| r.to_storage_range(ty, serializer)).collect()
	}
}

/// A predicate on one column, as handed to [`super::get_tablet_splits`]:
/// whether the column is indexed, and its own domain `D_i`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnConstraint {
	pub family: String,
	pub qualifier: String,
	pub indexed: bool,
	pub domain: Domain,
}
