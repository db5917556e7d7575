//! Range-splitting helpers shared by [`super::KvStore`] implementations.

use std::ops::Bound;

use crate::cell::Row;
use crate::kv::api::StorageRange;

/// Splits `range` at each of `boundaries` (sorted ascending, each the
/// inclusive end-key of one tablet), returning the non-empty intersection
/// of `range` with every tablet's sub-range.
pub fn split_by_boundaries(range: &StorageRange, boundaries: &[Row]) -> Vec<StorageRange> {
	let mut tablet_ranges = Vec::with_capacity(boundaries.len() + 1);
	let mut prev_end: Bound<Vec<u8>> = Bound::Unbounded;
	for b in boundaries {
		tablet_ranges.push(StorageRange {
			start: prev_end.clone(),
			end: Bound::Included(b.clone()),
		});
		prev_end = Bound::Excluded(b.clone());
	}
	tablet_ranges.push(StorageRange {
		start: prev_end,
		end: Bound::Unbounded,
	});

	tablet_ranges.iter().filter_map(|t| intersect(range, t)).collect()
}

/// The intersection of two ranges, or `None` if it is empty.
pub fn intersect(a: &StorageRange, b: &StorageRange) -> Option<StorageRange> {
	let start = max_start(&a.start, &b.start);
	let end = min_end(&a.end, &b.end);
	if is_empty(&start, &end) {
		None
	} else {
		Some(StorageRange {
			start,
			end,
		})
	}
}

fn max_start(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Bound<Vec<u8>> {
	match (a, b) {
		(Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
		(Bound::Included(x), Bound::Included(y)) => Bound::Included(std::cmp::max(x, y).clone()),
		(Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(std::cmp::max(x, y).clone()),
		(Bound::Included(x), Bound::Excluded(y)) | (Bound::Excluded(y), Bound::Included(x)) => {
			if x > y {
				Bound::Included(x.clone())
			} else {
				Bound::Excluded(y.clone())
			}
		}
	}
}

fn min_end(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Bound<Vec<u8>> {
	match (a, b) {
		(Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
		(Bound::Included(x), Bound::Included(y)) => Bound::Included(std::cmp::min(x, y).clone()),
		(Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(std::cmp::min(x, y).clone()),
		(Bound::Included(x), Bound::Excluded(y)) | (Bound::Excluded(y), Bound::Included(x)) => {
			if x < y {
				Bound::Included(x.clone())
			} else {
				Bound::Excluded(y.clone())
			}
		}
	}
}

fn is_empty(start: &Bound<Vec<u8>>, end: &Bound<Vec<u8>>) -> bool {
	match (start, end) {
		(Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
		(Bound::Included(s), Bound::Included(e)) => s > e,
		(Bound::Included(s), Bound::Excluded(e)) | (Bound::Excluded(s), Bound::Included(e)) => s >= e,
		(Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
	}
}
