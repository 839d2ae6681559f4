//! Keepsake Core Library
//!
//! This crate provides the snapshot capture pipeline for keepsake: it
//! fetches the content behind a link, classifies it, deduplicates it
//! against earlier captures, compresses it and stores it as an immutable
//! point-in-time record.
//!
//! # Architecture
//!
//! - **Pipeline**: stateless orchestration of fetch → classify → hash →
//!   dedup → compress, producing a [`CaptureOutcome`]
//! - **SQLite**: append-only snapshot storage, also used as the
//!   pipeline's duplicate lookup
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let pipeline = SnapshotPipeline::from_config(&config)?;
//! let store = SnapshotStore::open(&config)?;
//!
//! let request = CaptureRequest::new(link_id, "https://example.com");
//! if let CaptureOutcome::Created(record) = pipeline.capture(&request, &store).await? {
//!     store.insert_unless_duplicate(record)?;
//! }
//! ```
//!
//! # Modules
//!
//! - `pipeline`: Capture orchestration (main entry point)
//! - `fetch`: HTTP fetching under size, redirect and timeout limits
//! - `classify`: MIME type detection
//! - `codec`: Compression algorithms
//! - `hash`: Content fingerprints
//! - `source`: URL parsing and kinds
//! - `models`: Fetched content, snapshot records, capture outcomes
//! - `storage`: SQLite snapshot store
//! - `config`: Application configuration
//! - `error`: Snapshot error type

pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod models;
pub mod pipeline;
pub mod source;
pub mod storage;

pub use classify::{is_renderable_inline, Classifier, Signature};
pub use codec::Compression;
pub use config::Config;
pub use error::{SnapshotError, SnapshotResult};
pub use fetch::{FetchPolicy, Fetcher};
pub use hash::content_hash;
pub use models::{CaptureOutcome, FetchedContent, SnapshotRecord};
pub use pipeline::{
    decompress, render, CapturePolicy, CaptureRequest, DuplicateLookup, MimePolicy,
    NoDuplicates, SnapshotPipeline,
};
pub use source::{SourceUrl, UrlKind};
pub use storage::SnapshotStore;
