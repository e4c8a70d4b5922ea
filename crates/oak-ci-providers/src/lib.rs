//! Provider implementations: [`Embedder`](oak_ci_domain::ports::Embedder)
//! variants, a [`Summarizer`](oak_ci_domain::ports::Summarizer), and the
//! chunker strategies (spec.md §4.2, §4.4, §4.10).

pub mod chunker;
pub mod embedder;
pub mod summarizer;
