//! File -> semantic chunks contract (spec.md §4.4).
//!
//! A tree-sitter-backed structured chunker is out of scope for this crate
//! (spec.md §1 "Out of scope"); this trait is the contract a future
//! implementation plugs into without touching callers.

use crate::error::Result;

/// One semantic chunk of a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Enclosing symbol name, if the strategy could determine one.
    pub symbol_name: Option<String>,
    /// First line (1-based, inclusive).
    pub start_line: usize,
    /// Last line (1-based, inclusive).
    pub end_line: usize,
    /// Raw chunk text.
    pub content: String,
}

/// Turns a source file into an ordered, non-overlapping, fully-covering
/// sequence of [`Chunk`]s.
///
/// Contract: for the same `(filepath, content)` bytes, output is identical
/// (spec.md §4.4).
pub trait Chunker: Send + Sync {
    /// Chunk one file's content.
    ///
    /// # Errors
    ///
    /// Returns an error only for structurally invalid input (e.g. content
    /// that cannot be decoded); an unrecognized language must fall back to
    /// the sliding-window strategy rather than erroring.
    fn chunk(&self, filepath: &str, content: &str) -> Result<Vec<Chunk>>;
}
