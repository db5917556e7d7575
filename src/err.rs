//! The crate's error types.
//!
//! [`Error`] is the type surfaced at the crate boundary, per the three error
//! kinds described in the connector's failure model: `Backend` (any storage
//! fault), `Misconfiguration` (bad schema properties), and `Invariant`
//! (observed corruption of the metrics table).

use crate::kv;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A fault while talking to the underlying key/value store.
	#[error("backend error: {0}")]
	Backend(#[from] kv::Error),

	/// A schema property is missing, malformed, or refers to something that
	/// does not exist (e.g. a constraint on an unindexed column).
	#[error("misconfiguration: {0}")]
	Misconfiguration(String),

	/// An invariant the connector relies on has been violated by data it did
	/// not write itself — this indicates external corruption of the index or
	/// metrics tables and is not recoverable internally.
	#[error("invariant violated: {0}")]
	Invariant(String),
}

impl Error {
	pub fn misconfiguration(msg: impl Into<String>) -> Self {
		Error::Misconfiguration(msg.into())
	}

	pub fn invariant(msg: impl Into<String>) -> Self {
		Error::Invariant(msg.into())
	}
}
