//! A connector core that maps a relational table abstraction onto a sorted,
//! distributed key/value store organised as `(row, column family, column
//! qualifier, value)` cells.
//!
//! The crate has two load-bearing subsystems:
//! - [`indexer`]: a write path that derives inverted-index cells and
//!   cardinality statistics for every data mutation.
//! - [`planner`]: a read path that consults those statistics to choose
//!   between a full scan and one or more secondary-index probes, and
//!   packages the result into parallel scan splits.
//!
//! Everything else ([`kv`], [`cell`], [`schema`], [`serializer`]) exists to
//! support those two subsystems: a storage abstraction, the wire-level cell
//! model, table/column metadata, and an injected value-encoding capability.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cell;
pub mod cnf;
pub mod err;
pub mod indexer;
pub mod kv;
pub mod planner;
pub mod schema;
pub mod serializer;

pub use cell::{Cell, Mutation};
pub use err::Error;
pub use indexer::Indexer;
pub use planner::{get_tablet_splits, ColumnConstraint, Domain, Session, TabletSplitMetadata};

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
