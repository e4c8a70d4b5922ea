//! Vector index built on `hnsw_rs` (spec.md §4.3).
//!
//! This daemon has no external vector service to call, so the port is
//! implemented in-process against `hnsw_rs`'s `Hnsw` index with a flat
//! persistence format (one JSON manifest plus the serialized graph per
//! collection), following the `hnsw_rs` usage patterns common to
//! local-first semantic code search tools.

mod store;

pub use store::HnswVectorStore;
