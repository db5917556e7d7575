//! Artificial-split bisection and the final binning step (spec §4.D steps
//! 6–7).

use std::ops::Bound;

use rand::seq::SliceRandom;

use crate::kv::StorageRange;

/// One planner output unit: a preferred serving host plus the scan ranges to
/// run in one task (spec §4.D "Output").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabletSplitMetadata {
	pub preferred_host: String,
	pub ranges: Vec<StorageRange>,
}

/// The byte-wise midpoint of two equal-length keys. Processes most- to
/// least-significant byte, carrying a division remainder of 128 (half this
/// byte's place value, expressed in the next byte's units) into the next
/// byte — the standard technique for averaging two fixed-width big-endian
/// numbers one byte at a time (spec §4.D step 6). Saturates rather than
/// propagating further on the rare overflow a received carry causes in an
/// already-near-0xFF byte; see `DESIGN.md`.
pub(crate) fn midpoint(a: &[u8], b: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(a.len());
	let mut carry: u16 = 0;
	for (&x, &y) in a.iter().zip(b.iter()) {
		let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
		let diff = (hi - lo) as u16;
		let sum = lo as u16 + diff / 2 + carry;
		out.push(sum.min(255) as u8);
		carry = if diff % 2 == 1 { 128 } else { 0 };
	}
	out
}

fn equalize_len(a: &[u8], b: &[u8]) -> (Vec<u8>, Vec<u8>) {
	let len = a.len().max(b.len());
	let mut a = a.to_vec();
	let mut b = b.to_vec();
	a.resize(len, 0);
	b.resize(len, 0);
	(a, b)
}

/// Recursively bisects `range` by its byte-wise midpoint for `levels`
/// levels, re-bisecting both halves at each level (Open Question (b): up to
/// `2^levels` sub-ranges per input range). Unbounded endpoints clamp to
/// `first`/`last` (spec §4.D step 6).
pub(crate) fn bisect_range(range: &StorageRange, first: &[u8], last: &[u8], levels: usize) -> Vec<StorageRange> {
	if levels == 0 {
		return vec![range.clone()];
	}

	let start = match &range.start {
		Bound::Unbounded => first.to_vec(),
		Bound::Included(v) | Bound::Excluded(v) => v.clone(),
	};
	let end = match &range.end {
		Bound::Unbounded => last.to_vec(),
		Bound::Included(v) | Bound::Excluded(v) => v.clone(),
	};
	let (start, end) = equalize_len(&start, &end);
	let mid = midpoint(&start, &end);

	let lower = StorageRange {
		start: range.start.clone(),
		end: Bound::Excluded(mid.clone()),
	};
	let upper = StorageRange {
		start: Bound::Included(mid),
		end: range.end.clone(),
	};

	let mut out = bisect_range(&lower, first, last, levels - 1);
	out.extend(bisect_range(&upper, first, last, levels - 1));
	out
}

/// Shuffles the surviving candidate ranges, then bins them in chunks of
/// `ranges_per_split` (spec §4.D step 7).
pub(crate) fn shuffle_and_bin(mut ranges: Vec<StorageRange>, ranges_per_split: usize) -> Vec<Vec<StorageRange>> {
	let mut rng = rand::thread_rng();
	ranges.shuffle(&mut rng);
	ranges.chunks(ranges_per_split.max(1)).map(|c| c.to_vec()).collect()
}
