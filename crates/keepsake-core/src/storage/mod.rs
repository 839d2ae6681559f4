//! Storage layer
//!
//! Snapshots live in a single SQLite database under the data directory.
//! The store doubles as the pipeline's duplicate lookup.

pub mod schema;
pub mod snapshots;

pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use snapshots::SnapshotStore;
