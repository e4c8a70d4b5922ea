//! `CodeChunk` and its relational shadow row `IndexedFile` (spec.md §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ChunkId;

/// A contiguous, semantically meaningful region of a source file, held in
/// the `code` vector collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Daemon-assigned id (also the vector store item id).
    pub id: ChunkId,
    /// Path relative to the project root.
    pub filepath: String,
    /// First line of the chunk (1-based, inclusive).
    pub start_line: usize,
    /// Last line of the chunk (1-based, inclusive).
    pub end_line: usize,
    /// Enclosing symbol name (function/class/method), if the chunker could
    /// determine one.
    pub symbol_name: Option<String>,
    /// Raw chunk text.
    pub content: String,
    /// Hash of this chunk's content, used for incremental reconciliation.
    pub content_hash: String,
}

/// Truth of what is currently indexed for one file (invariant 5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedFile {
    /// Path relative to the project root.
    pub filepath: String,
    /// Hash of the full file content at last index time.
    pub content_hash: String,
    /// Modification time observed at last index time.
    pub mtime: DateTime<Utc>,
    /// Number of chunks currently stored for this file.
    pub chunk_count: usize,
    /// When this file was last (re)indexed.
    pub last_indexed_at: DateTime<Utc>,
    /// Last provider error encountered indexing this file, if any
    /// (spec.md §4.6 "Failure semantics").
    pub last_error: Option<String>,
}
