//! Version-history forest reconstruction for loosely-structured document
//! stores.
//!
//! A store answers a history query with a flat list of version records
//! that may contain duplicates and dangling references. Each record is a
//! JSON object that may carry its identity and lineage pointers in any of
//! several envelope locations. Stemma resolves a canonical identifier per
//! record and links the records into a parent/child forest. Siblings are
//! ordered by recency, and the root(s) are picked even when root markers
//! are missing or contradict the link data.
//!
//! The reconstruction itself ([`HistoryGraph::build`]) is a pure transform
//! with no I/O; malformed fields are treated as absent rather than
//! reported. Fetching lives in [`client`], which knows the store's
//! `/history/` and `/since/` endpoint pair and the policy that ancestry
//! failures are fatal while descendant failures degrade.
#![forbid(unsafe_code)]

/// Remote fetching of version records and refresh supersession.
pub mod client;

/// Display helpers: label derivation and relative-time formatting.
pub mod display;

/// Error and result types shared across the crate.
pub mod error;

/// The history-graph builder and its immutable output snapshot.
pub mod graph;

/// Derived query surface: parent lookup and flattened version summaries.
pub mod query;

/// Field-resolution heuristics for version records.
///
/// One resolution function per lineage concept, so each precedence order
/// lives in exactly one place and caller-side lookups agree with the keys
/// the builder produces.
pub mod record;

pub use client::{FetchOptions, HistoryClient, HistorySession};
pub use error::{HistoryError, Result};
pub use graph::{dedup_records, HistoryGraph};
pub use query::VersionSummary;
pub use record::resolve_id;
