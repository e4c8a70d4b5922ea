//! Best-effort structured chunking for a handful of popular languages.
//!
//! This recognizes top-level function/class/struct/impl declarations by a
//! line-anchored pattern match and slices the file at each declaration
//! boundary. It is intentionally not a full parser — spec.md scopes a
//! tree-sitter-based chunker out of this crate — but it gives symbol-aware
//! chunks for the common case instead of always falling back to fixed
//! windows.

use oak_ci_domain::error::Result;
use oak_ci_domain::ports::Chunk;

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "rb",
];

/// Declaration-boundary detector for recognized languages.
#[derive(Default)]
pub struct StructuredChunker {
    _private: (),
}

impl StructuredChunker {
    /// Whether this strategy recognizes the given file's extension.
    #[must_use]
    pub fn recognizes(&self, filepath: &str) -> bool {
        extension_of(filepath)
            .is_some_and(|ext| RECOGNIZED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Chunk `content` at detected declaration boundaries.
    pub fn chunk(&self, filepath: &str, content: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut boundaries: Vec<(usize, String)> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if let Some(symbol) = detect_symbol(line) {
                boundaries.push((idx, symbol));
            }
        }

        if boundaries.is_empty() {
            return Ok(vec![Chunk {
                symbol_name: None,
                start_line: 1,
                end_line: lines.len(),
                content: content.to_owned(),
            }]);
        }

        let mut chunks = Vec::new();
        if boundaries[0].0 > 0 {
            chunks.push(Chunk {
                symbol_name: None,
                start_line: 1,
                end_line: boundaries[0].0,
                content: lines[0..boundaries[0].0].join("\n"),
            });
        }

        for (i, (start_idx, symbol)) in boundaries.iter().enumerate() {
            let end_idx = boundaries
                .get(i + 1)
                .map_or(lines.len(), |(next_idx, _)| *next_idx);
            chunks.push(Chunk {
                symbol_name: Some(symbol.clone()),
                start_line: start_idx + 1,
                end_line: end_idx,
                content: lines[*start_idx..end_idx].join("\n"),
            });
        }

        let _ = filepath;
        Ok(chunks)
    }
}

fn extension_of(filepath: &str) -> Option<String> {
    filepath
        .rsplit('.')
        .next()
        .filter(|ext| *ext != filepath)
        .map(str::to_ascii_lowercase)
}

/// Recognizes a handful of common top-level declaration shapes and returns
/// the declared symbol's name.
fn detect_symbol(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    const MARKERS: &[&str] = &[
        "fn ", "pub fn ", "async fn ", "pub async fn ", "def ", "function ", "struct ",
        "pub struct ", "class ", "impl ", "pub impl ", "interface ", "func ", "pub(crate) fn ",
    ];
    for marker in MARKERS {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_function_boundaries() {
        let chunker = StructuredChunker::default();
        let content = "use std::io;\n\nfn one() {\n    1\n}\n\nfn two() {\n    2\n}\n";
        let chunks = chunker.chunk("lib.rs", content).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].symbol_name, None);
        assert_eq!(chunks[1].symbol_name.as_deref(), Some("one"));
        assert_eq!(chunks[2].symbol_name.as_deref(), Some("two"));
    }

    #[test]
    fn unrecognized_extension_is_not_claimed() {
        let chunker = StructuredChunker::default();
        assert!(!chunker.recognizes("README.md"));
        assert!(chunker.recognizes("main.rs"));
    }
}
