//! Metadata key vocabulary shared by everything that writes to or reads
//! from [`oak_ci_domain::ports::VectorStore`] collections.
//!
//! The vector store itself is metadata-agnostic (`HashMap<String, Value>`);
//! these constants are the contract the indexer/background processor
//! (writers) and the retrieval/hook services (readers) agree on.

use std::collections::HashMap;

use serde_json::Value;

/// Mirrors [`oak_ci_domain::ports::VectorItem::metadata`]'s type; the alias
/// itself isn't part of the port's public re-export surface.
type VectorMetadata = HashMap<String, Value>;

pub const FILEPATH: &str = "filepath";
pub const START_LINE: &str = "start_line";
pub const END_LINE: &str = "end_line";
pub const SYMBOL_NAME: &str = "symbol_name";
pub const CONTENT_HASH: &str = "content_hash";

pub const OBSERVATION_TYPE: &str = "type";
pub const TAGS: &str = "tags";
pub const IMPORTANCE: &str = "importance";
pub const ARCHIVED: &str = "archived";
pub const SESSION_ID: &str = "session_id";
pub const BATCH_ID: &str = "batch_id";
pub const TITLE: &str = "title";
pub const CREATED_AT: &str = "created_at";

/// Reads a string field out of vector-item metadata.
#[must_use]
pub fn get_str<'a>(metadata: &'a VectorMetadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

/// Reads a `usize` field out of vector-item metadata.
#[must_use]
pub fn get_usize(metadata: &VectorMetadata, key: &str) -> Option<usize> {
    metadata.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

/// Reads a `bool` field out of vector-item metadata, defaulting to `false`.
#[must_use]
pub fn get_bool(metadata: &VectorMetadata, key: &str) -> bool {
    metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
}
