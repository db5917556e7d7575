//! Errors surfaced by a [`super::KvStore`] implementation.

use thiserror::Error;

/// The three error kinds a [`super::KvStore`] may fail with (spec §4.A).
/// The core never recovers internally from [`Error::Backend`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A storage fault: timeout, connection loss, or any other failure of
	/// the underlying store itself.
	#[error("backend fault: {0}")]
	Backend(String),

	/// The caller's credentials were rejected by the backend.
	#[error("authorization failed: {0}")]
	Auth(String),

	/// The requested table or tablet does not exist.
	#[error("not found: {0}")]
	NotFound(String),
}
