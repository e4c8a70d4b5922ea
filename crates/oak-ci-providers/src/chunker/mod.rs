//! Chunking strategies (spec.md §4.4).
//!
//! A tree-sitter-backed structured parser is out of scope for this crate
//! (it is specified only as the [`oak_ci_domain::ports::Chunker`] contract);
//! [`FallbackChunker`] here is a deterministic sliding-window strategy that
//! every recognized-or-not file falls back to.

mod sliding_window;
mod structured;

pub use sliding_window::SlidingWindowChunker;
pub use structured::StructuredChunker;

use oak_ci_domain::ports::{Chunk, Chunker};
use oak_ci_domain::error::Result;

/// Dispatches to a structured, brace-aware strategy for recognized
/// languages and falls back to a fixed-size sliding window otherwise.
pub struct LanguageAwareChunker {
    structured: StructuredChunker,
    fallback: SlidingWindowChunker,
}

impl LanguageAwareChunker {
    /// Build the default chunker with the documented defaults (spec.md §4.4
    /// line-range coverage contract).
    #[must_use]
    pub fn new() -> Self {
        Self {
            structured: StructuredChunker::default(),
            fallback: SlidingWindowChunker::default(),
        }
    }
}

impl Default for LanguageAwareChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for LanguageAwareChunker {
    fn chunk(&self, filepath: &str, content: &str) -> Result<Vec<Chunk>> {
        if self.structured.recognizes(filepath) {
            self.structured.chunk(filepath, content)
        } else {
            self.fallback.chunk(filepath, content)
        }
    }
}

/// Content hash used by the indexer for incremental reconciliation
/// (spec.md §4.4 "content_hash = hash(concat(chunk contents))").
#[must_use]
pub fn content_hash(chunks: &[Chunk]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_whole_file_without_overlap() {
        let chunker = LanguageAwareChunker::new();
        let content = "a\nb\nc\nd\ne\n";
        let chunks = chunker.chunk("notes.txt", content).unwrap();
        let mut expected_line = 1usize;
        for chunk in &chunks {
            assert_eq!(chunk.start_line, expected_line);
            expected_line = chunk.end_line + 1;
        }
        assert_eq!(expected_line - 1, content.lines().count());
    }

    #[test]
    fn identical_input_yields_identical_hash() {
        let chunker = LanguageAwareChunker::new();
        let content = "fn main() {}\n";
        let a = chunker.chunk("main.rs", content).unwrap();
        let b = chunker.chunk("main.rs", content).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }
}
