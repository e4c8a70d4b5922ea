//! Sliding-window fallback strategy for files whose language isn't
//! recognized by [`super::structured::StructuredChunker`].

use oak_ci_domain::error::Result;
use oak_ci_domain::ports::Chunk;

/// Splits content into fixed-size, non-overlapping line windows.
pub struct SlidingWindowChunker {
    lines_per_chunk: usize,
}

impl SlidingWindowChunker {
    /// Build a chunker with the given window size, in lines.
    #[must_use]
    pub fn with_window(lines_per_chunk: usize) -> Self {
        Self {
            lines_per_chunk: lines_per_chunk.max(1),
        }
    }

    /// Chunk `content`, producing one [`Chunk`] per window.
    pub fn chunk(&self, _filepath: &str, content: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < lines.len() {
            let end = (start + self.lines_per_chunk).min(lines.len());
            let body = lines[start..end].join("\n");
            chunks.push(Chunk {
                symbol_name: None,
                start_line: start + 1,
                end_line: end,
                content: body,
            });
            start = end;
        }
        Ok(chunks)
    }
}

impl Default for SlidingWindowChunker {
    fn default() -> Self {
        Self::with_window(60)
    }
}
