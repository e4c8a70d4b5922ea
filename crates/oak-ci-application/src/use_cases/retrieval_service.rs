//! Unified retrieval over the code/memory/plan vector collections
//! (spec.md §4.8).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{Collection, Embedder, SearchFilter, VectorStore};
use oak_ci_domain::value_objects::ConfidenceTier;

use crate::metadata;

/// Which collection(s) a [`RetrievalService::search`] call targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchType {
    /// Only the `code` collection.
    Code,
    /// Only the `memory` collection.
    Memory,
    /// Only the `plan` collection.
    Plan,
    /// All three collections, merged by score.
    All,
}

impl SearchType {
    fn collections(self) -> &'static [Collection] {
        match self {
            Self::Code => &[Collection::Code],
            Self::Memory => &[Collection::Memory],
            Self::Plan => &[Collection::Plan],
            Self::All => &[Collection::Code, Collection::Memory, Collection::Plan],
        }
    }
}

/// One retrieval hit, tagged with its collection and confidence tier.
#[derive(Clone, Debug)]
pub struct RetrievedItem {
    /// Id of the underlying vector-store item.
    pub id: String,
    /// Which collection this hit came from.
    pub collection: Collection,
    /// Cosine similarity score in `[0, 1]`.
    pub score: f32,
    /// Bucketed confidence (spec.md §4.8 step 3).
    pub tier: ConfidenceTier,
    /// Original document text.
    pub document: String,
    /// Metadata attached at index/embed time.
    pub metadata: HashMap<String, Value>,
}

/// Embeds a query once and fans it out to one or more vector collections,
/// merging results by score with a deterministic tie-break.
pub struct RetrievalService {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    high_confidence_threshold: f32,
    medium_confidence_threshold: f32,
}

impl RetrievalService {
    /// Build a retrieval service over a fixed embedder and its thresholds
    /// (spec.md §4.1 `retrieval.high_confidence_threshold` /
    /// `medium_confidence_threshold`).
    #[must_use]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        high_confidence_threshold: f32,
        medium_confidence_threshold: f32,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            high_confidence_threshold,
            medium_confidence_threshold,
        }
    }

    /// Embed `query_text` once, search the requested collection(s), and
    /// return up to `limit` merged hits ordered by score desc then
    /// `metadata["created_at"]` desc (spec.md §4.8 step 3, §9 open
    /// question (b): current behavior, documented in DESIGN.md).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if a targeted collection's
    /// fixed dimension no longer matches the embedder's; the caller should
    /// prompt a `reset` of that collection.
    pub async fn search(
        &self,
        query_text: &str,
        search_type: SearchType,
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<RetrievedItem>> {
        if query_text.trim().is_empty() {
            return Err(Error::invalid_argument("query text must not be empty"));
        }

        let mut embeddings = self.embedder.embed(std::slice::from_ref(&query_text.to_owned())).await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| Error::VectorStore { message: "embedder returned no vector".to_owned() })?;

        let mut combined = Vec::new();
        for &collection in search_type.collections() {
            if let Some(dim) = self.vector_store.dimension(collection).await? {
                if dim != self.embedder.dimensions() {
                    return Err(Error::DimensionMismatch { expected: dim, actual: self.embedder.dimensions() });
                }
            }
            let hits = self.vector_store.search(collection, &query_embedding, limit, filter, None).await?;
            combined.extend(hits.into_iter().map(|hit| {
                let tier = ConfidenceTier::from_score(hit.score, self.high_confidence_threshold, self.medium_confidence_threshold);
                RetrievedItem {
                    id: hit.id,
                    collection,
                    score: hit.score,
                    tier,
                    document: hit.document,
                    metadata: hit.metadata,
                }
            }));
        }

        combined.sort_by(tie_break);
        combined.truncate(limit);
        Ok(combined)
    }

    /// Keep only hits at or above `min` confidence.
    #[must_use]
    pub fn filter_by_confidence(items: Vec<RetrievedItem>, min: ConfidenceTier) -> Vec<RetrievedItem> {
        items.into_iter().filter(|item| item.tier.at_least(min)).collect()
    }
}

fn tie_break(a: &RetrievedItem, b: &RetrievedItem) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let a_created = metadata::get_str(&a.metadata, metadata::CREATED_AT);
            let b_created = metadata::get_str(&b.metadata, metadata::CREATED_AT);
            b_created.cmp(&a_created)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oak_ci_domain::ports::{SearchResult, VectorItem};

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn context_window(&self) -> usize {
            8192
        }
        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    struct StubVectorStore;

    #[async_trait]
    impl VectorStore for StubVectorStore {
        async fn add(&self, _collection: Collection, _items: Vec<VectorItem>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _collection: Collection, _filter: &SearchFilter) -> Result<usize> {
            Ok(0)
        }
        async fn search(
            &self,
            collection: Collection,
            _query_embedding: &[f32],
            _k: usize,
            _filter: Option<&SearchFilter>,
            _min_score: Option<f32>,
        ) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                id: format!("{}-hit", collection.name()),
                score: 0.9,
                metadata: HashMap::new(),
                document: "doc".to_owned(),
            }])
        }
        async fn stats(&self, _collection: Collection) -> Result<(usize, usize)> {
            Ok((1, 8))
        }
        async fn reset(&self, _collection: Collection) -> Result<()> {
            Ok(())
        }
        async fn dimension(&self, _collection: Collection) -> Result<Option<usize>> {
            Ok(Some(2))
        }
    }

    #[tokio::test]
    async fn all_search_type_merges_every_collection() {
        let service = RetrievalService::new(Arc::new(StubVectorStore), Arc::new(StubEmbedder), 0.75, 0.5);
        let hits = service.search("dark mode", SearchType::All, 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.tier == ConfidenceTier::High));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let service = RetrievalService::new(Arc::new(StubVectorStore), Arc::new(StubEmbedder), 0.75, 0.5);
        let err = service.search("   ", SearchType::Code, 10, None).await;
        assert!(matches!(err, Err(Error::InvalidArgument { .. })));
    }
}
