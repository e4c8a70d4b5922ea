//! Content-addressed vector collections (spec.md §4.3).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

/// One of the three logical collections the daemon maintains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Code chunks produced by the indexer.
    Code,
    /// Distilled memories (observations).
    Memory,
    /// Embedded plan content.
    Plan,
}

impl Collection {
    /// Stable name used as the on-disk/collection key.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Memory => "memory",
            Self::Plan => "plan",
        }
    }
}

/// Flat string/number metadata attached to a vector item.
pub type Metadata = HashMap<String, Value>;

/// One item to insert or replace in a collection.
#[derive(Clone, Debug)]
pub struct VectorItem {
    /// Stable id; re-adding the same id replaces the prior item.
    pub id: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Arbitrary metadata used for filtering and rendering.
    pub metadata: Metadata,
    /// The original text the embedding was computed from.
    pub document: String,
}

/// A single nearest-neighbour search hit.
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Id of the matched item.
    pub id: String,
    /// Cosine similarity score in `[0, 1]`.
    pub score: f32,
    /// Metadata attached at insert time.
    pub metadata: Metadata,
    /// The original document text.
    pub document: String,
}

/// An equality filter over metadata fields, ANDed together.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    /// `(field, value)` pairs that must all match.
    pub equals: Vec<(String, Value)>,
}

impl SearchFilter {
    /// Build a filter matching a single field.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            equals: vec![(field.into(), value.into())],
        }
    }

    /// Add another required field match.
    #[must_use]
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    /// Whether the given metadata map satisfies this filter.
    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(field, value)| metadata.get(field) == Some(value))
    }
}

/// Approximate-nearest-neighbour vector store over named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace items by id. A collection's dimension is fixed on
    /// first write; later writes with a mismatched dimension fail with
    /// [`crate::error::Error::DimensionMismatch`].
    async fn add(&self, collection: Collection, items: Vec<VectorItem>) -> Result<()>;

    /// Delete every item whose metadata matches `filter`.
    async fn delete(&self, collection: Collection, filter: &SearchFilter) -> Result<usize>;

    /// Nearest-neighbour search, optionally metadata-filtered and/or
    /// score-thresholded.
    async fn search(
        &self,
        collection: Collection,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchResult>>;

    /// Item count and approximate byte size of a collection.
    async fn stats(&self, collection: Collection) -> Result<(usize, usize)>;

    /// Drop every item in a collection (required before switching embedding
    /// models, since dimension is fixed on first write).
    async fn reset(&self, collection: Collection) -> Result<()>;

    /// The embedding dimension this collection was created with, if it has
    /// received any writes yet.
    async fn dimension(&self, collection: Collection) -> Result<Option<usize>>;
}
