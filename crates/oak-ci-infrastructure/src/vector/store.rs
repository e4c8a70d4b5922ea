use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{Collection, SearchFilter, SearchResult, VectorItem, VectorStore};

const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 200;

#[derive(Serialize, Deserialize, Default)]
struct Manifest {
    dimension: Option<usize>,
    items: Vec<StoredItem>,
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredItem {
    id: String,
    embedding: Vec<f32>,
    metadata: HashMap<String, serde_json::Value>,
    document: String,
}

struct CollectionState {
    dimension: Option<usize>,
    /// Source of truth; the HNSW graph is rebuilt from this on every
    /// structural change since `hnsw_rs` has no delete operation.
    items: indexmap::IndexMap<String, StoredItem>,
}

impl CollectionState {
    fn new() -> Self {
        Self {
            dimension: None,
            items: indexmap::IndexMap::new(),
        }
    }

    fn build_index(&self) -> Option<Hnsw<'_, f32, DistCosine>> {
        if self.items.is_empty() {
            return None;
        }
        let hnsw = Hnsw::<f32, DistCosine>::new(
            MAX_NB_CONNECTION,
            self.items.len(),
            MAX_LAYER,
            EF_CONSTRUCTION,
            DistCosine {},
        );
        for (slot, item) in self.items.values().enumerate() {
            hnsw.insert((item.embedding.as_slice(), slot));
        }
        Some(hnsw)
    }
}

/// In-process approximate-nearest-neighbour store, one `hnsw_rs` graph per
/// collection, persisted as a flat JSON manifest under `vector_dir`.
pub struct HnswVectorStore {
    dir: PathBuf,
    code: RwLock<CollectionState>,
    memory: RwLock<CollectionState>,
    plan: RwLock<CollectionState>,
}

impl HnswVectorStore {
    /// Load (or create) the vector directory at `dir`.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let store = Self {
            dir: dir.to_owned(),
            code: RwLock::new(load_manifest(dir, Collection::Code)?),
            memory: RwLock::new(load_manifest(dir, Collection::Memory)?),
            plan: RwLock::new(load_manifest(dir, Collection::Plan)?),
        };
        Ok(store)
    }

    fn state(&self, collection: Collection) -> &RwLock<CollectionState> {
        match collection {
            Collection::Code => &self.code,
            Collection::Memory => &self.memory,
            Collection::Plan => &self.plan,
        }
    }

    fn manifest_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    async fn persist(&self, collection: Collection, state: &CollectionState) -> Result<()> {
        let manifest = Manifest {
            dimension: state.dimension,
            items: state.items.values().cloned().collect(),
        };
        let body = serde_json::to_vec(&manifest).map_err(Error::from)?;
        let path = self.manifest_path(collection);
        tokio::task::spawn_blocking(move || std::fs::write(path, body))
            .await
            .map_err(|e| Error::VectorStore { message: e.to_string() })?
            .map_err(Error::from)?;
        Ok(())
    }
}

fn load_manifest(dir: &Path, collection: Collection) -> Result<CollectionState> {
    let path = dir.join(format!("{}.json", collection.name()));
    if !path.exists() {
        return Ok(CollectionState::new());
    }
    let body = std::fs::read(&path)?;
    let manifest: Manifest = serde_json::from_slice(&body).map_err(Error::from)?;
    let mut state = CollectionState::new();
    state.dimension = manifest.dimension;
    for item in manifest.items {
        state.items.insert(item.id.clone(), item);
    }
    Ok(state)
}

#[async_trait]
impl VectorStore for HnswVectorStore {
    async fn add(&self, collection: Collection, items: Vec<VectorItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut state = self.state(collection).write().await;
        let incoming_dim = items[0].embedding.len();
        let expected = *state.dimension.get_or_insert(incoming_dim);
        for item in &items {
            if item.embedding.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: item.embedding.len(),
                });
            }
        }
        for item in items {
            state.items.insert(
                item.id.clone(),
                StoredItem {
                    id: item.id,
                    embedding: item.embedding,
                    metadata: item.metadata,
                    document: item.document,
                },
            );
        }
        self.persist(collection, &state).await
    }

    async fn delete(&self, collection: Collection, filter: &SearchFilter) -> Result<usize> {
        let mut state = self.state(collection).write().await;
        let before = state.items.len();
        state.items.retain(|_, item| !filter.matches(&item.metadata));
        let removed = before - state.items.len();
        if removed > 0 {
            self.persist(collection, &state).await?;
        }
        Ok(removed)
    }

    async fn search(
        &self,
        collection: Collection,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state(collection).read().await;
        if state.items.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dim) = state.dimension {
            if query_embedding.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: query_embedding.len(),
                });
            }
        }

        let index = state
            .build_index()
            .ok_or_else(|| Error::VectorStore { message: "empty collection".into() })?;
        // Over-fetch since metadata filtering happens after the ANN search.
        let fetch_k = (k * 4).max(k).max(16);
        let neighbours = index.search(query_embedding, fetch_k, EF_SEARCH);

        let slots: Vec<&StoredItem> = state.items.values().collect();
        let mut results = Vec::with_capacity(neighbours.len());
        for neighbour in neighbours {
            let Some(item) = slots.get(neighbour.d_id) else { continue };
            if let Some(filter) = filter {
                if !filter.matches(&item.metadata) {
                    continue;
                }
            }
            let score = (1.0 - neighbour.distance).clamp(0.0, 1.0);
            if let Some(min_score) = min_score {
                if score < min_score {
                    continue;
                }
            }
            results.push(SearchResult {
                id: item.id.clone(),
                score,
                metadata: item.metadata.clone(),
                document: item.document.clone(),
            });
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }

    async fn stats(&self, collection: Collection) -> Result<(usize, usize)> {
        let state = self.state(collection).read().await;
        let bytes: usize = state
            .items
            .values()
            .map(|i| i.embedding.len() * std::mem::size_of::<f32>() + i.document.len())
            .sum();
        Ok((state.items.len(), bytes))
    }

    async fn reset(&self, collection: Collection) -> Result<()> {
        let mut state = self.state(collection).write().await;
        *state = CollectionState::new();
        self.persist(collection, &state).await
    }

    async fn dimension(&self, collection: Collection) -> Result<Option<usize>> {
        Ok(self.state(collection).read().await.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, embedding: Vec<f32>) -> VectorItem {
        VectorItem {
            id: id.to_owned(),
            embedding,
            metadata: HashMap::new(),
            document: format!("doc-{id}"),
        }
    }

    #[tokio::test]
    async fn add_then_search_finds_nearest() {
        let dir = tempfile::tempdir().unwrap();
        let store = HnswVectorStore::open(dir.path()).await.unwrap();
        store
            .add(
                Collection::Code,
                vec![
                    item("a", vec![1.0, 0.0, 0.0]),
                    item("b", vec![0.0, 1.0, 0.0]),
                    item("c", vec![0.9, 0.1, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search(Collection::Code, &[1.0, 0.0, 0.0], 2, None, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.id == "a"));
    }

    #[tokio::test]
    async fn mismatched_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = HnswVectorStore::open(dir.path()).await.unwrap();
        store.add(Collection::Memory, vec![item("a", vec![1.0, 0.0])]).await.unwrap();
        let err = store.add(Collection::Memory, vec![item("b", vec![1.0, 0.0, 0.0])]).await;
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn reset_clears_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let store = HnswVectorStore::open(dir.path()).await.unwrap();
        store.add(Collection::Plan, vec![item("a", vec![1.0, 0.0])]).await.unwrap();
        store.reset(Collection::Plan).await.unwrap();
        assert_eq!(store.dimension(Collection::Plan).await.unwrap(), None);
    }
}
