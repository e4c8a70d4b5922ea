//! Full and incremental index runs (spec.md §4.6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use ignore::WalkBuilder;
use serde::Serialize;
use sha2::{Digest, Sha256};

use oak_ci_domain::entities::{CodeChunk, IndexedFile};
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{
    ActivityStore, Chunk, Chunker, Collection, DomainEvent, Embedder, EventBus, FileChangeEvent,
    FileChangeKind, IndexingProgress, SearchFilter, VectorItem, VectorStore,
};
use oak_ci_domain::value_objects::ChunkId;

use crate::exclusion::ExclusionPolicy;
use crate::metadata;

/// Items written to a vector collection in one call (spec.md §5 "per-collection write batch <= 64").
const WRITE_BATCH: usize = 64;

/// Outcome of one full index run.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct IndexReport {
    /// Files chunked, embedded and written.
    pub files_indexed: usize,
    /// Files skipped because their content hash is unchanged.
    pub files_skipped: usize,
    /// Files that failed; logged and recorded on the file's shadow row,
    /// the run continued.
    pub files_failed: usize,
}

enum FileOutcome {
    Indexed,
    Skipped,
}

/// Keeps the `code` vector collection and the `indexed_files` shadow table
/// in sync with the project's source tree.
pub struct IndexingService {
    project_root: PathBuf,
    policy: ExclusionPolicy,
    skip_empty: bool,
    activity_store: Arc<dyn ActivityStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Arc<dyn Chunker>,
    event_bus: Arc<dyn EventBus>,
    // One lock per file so a watcher-driven change can't interleave with a
    // full run touching the same path (spec.md §5 "serialized per-file").
    file_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl IndexingService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_root: PathBuf,
        policy: ExclusionPolicy,
        skip_empty: bool,
        activity_store: Arc<dyn ActivityStore>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chunker: Arc<dyn Chunker>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            project_root,
            policy,
            skip_empty,
            activity_store,
            vector_store,
            embedder,
            chunker,
            event_bus,
            file_locks: DashMap::new(),
        }
    }

    /// Walk the project tree, reconcile every eligible file against its
    /// `indexed_files` shadow row, and sweep entries for files removed from
    /// disk since the last run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the walk itself or the stale-entry sweep's
    /// store calls fail; a single file's chunk/embed/write failure is
    /// recorded on that file and does not abort the run.
    pub async fn full_index(&self) -> Result<IndexReport> {
        let candidates = self.enumerate_candidates()?;
        self.event_bus.publish(DomainEvent::IndexingStarted { total_files: candidates.len() }).await;

        let mut report = IndexReport::default();
        let mut seen = std::collections::HashSet::with_capacity(candidates.len());

        for (processed, relative) in candidates.iter().enumerate() {
            seen.insert(relative.clone());
            self.event_bus
                .publish(DomainEvent::IndexingProgress(IndexingProgress {
                    processed,
                    total: candidates.len(),
                    current_file: Some(relative.clone()),
                }))
                .await;

            match self.reindex_file(relative).await {
                Ok(FileOutcome::Indexed) => report.files_indexed += 1,
                Ok(FileOutcome::Skipped) => report.files_skipped += 1,
                Err(e) => {
                    oak_ci_domain::warn!("indexer", "failed to index file", format!("{relative}: {e}"));
                    report.files_failed += 1;
                    self.mark_error(relative, &e.to_string()).await?;
                }
            }
        }

        for existing in self.activity_store.list_indexed_files().await? {
            if !seen.contains(&existing.filepath) {
                self.remove_file(&existing.filepath).await?;
            }
        }

        self.event_bus
            .publish(DomainEvent::IndexingCompleted {
                files_indexed: report.files_indexed,
                files_failed: report.files_failed,
            })
            .await;
        Ok(report)
    }

    /// Apply one debounced filesystem change (spec.md §4.6 incremental
    /// path). `event.path` is already relative to the project root.
    pub async fn apply_change(&self, event: FileChangeEvent) -> Result<()> {
        let relative = event.path.to_string_lossy().into_owned();
        let _guard = self.lock_for(&relative).await;

        match event.kind {
            FileChangeKind::Created | FileChangeKind::Modified => {
                self.reindex_file(&relative).await?;
            }
            FileChangeKind::Deleted => {
                self.remove_file(&relative).await?;
            }
            FileChangeKind::Renamed => {
                if let Some(previous) = &event.previous_path {
                    let previous = previous.to_string_lossy().into_owned();
                    self.remove_file(&previous).await?;
                }
                self.reindex_file(&relative).await?;
            }
        }
        Ok(())
    }

    async fn lock_for(&self, relative: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .file_locks
            .entry(relative.to_owned())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn reindex_file(&self, relative: &str) -> Result<FileOutcome> {
        let absolute = self.project_root.join(relative);
        let content = match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.remove_file(relative).await?;
                return Ok(FileOutcome::Skipped);
            }
            Err(e) => return Err(Error::from(e)),
        };

        if content.is_empty() && self.skip_empty {
            self.remove_file(relative).await?;
            return Ok(FileOutcome::Skipped);
        }

        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
        if let Some(existing) = self.activity_store.get_indexed_file(relative).await? {
            if existing.content_hash == content_hash && existing.last_error.is_none() {
                return Ok(FileOutcome::Skipped);
            }
        }

        let chunks = build_chunks(self.chunker.as_ref(), relative, &content)?;

        self.vector_store.delete(Collection::Code, &SearchFilter::eq(metadata::FILEPATH, relative)).await?;

        let mut stored = 0usize;
        for batch in chunks.chunks(WRITE_BATCH) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            let items: Vec<VectorItem> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorItem {
                    id: chunk.id.to_string(),
                    embedding,
                    metadata: chunk_metadata(chunk),
                    document: chunk.content.clone(),
                })
                .collect();
            stored += items.len();
            self.vector_store.add(Collection::Code, items).await?;
        }

        let mtime = tokio::fs::metadata(&absolute)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::<chrono::Utc>::from)
            .unwrap_or_else(chrono::Utc::now);

        self.activity_store
            .upsert_indexed_file(IndexedFile {
                filepath: relative.to_owned(),
                content_hash,
                mtime,
                chunk_count: stored,
                last_indexed_at: chrono::Utc::now(),
                last_error: None,
            })
            .await?;

        Ok(FileOutcome::Indexed)
    }

    async fn remove_file(&self, relative: &str) -> Result<()> {
        self.vector_store.delete(Collection::Code, &SearchFilter::eq(metadata::FILEPATH, relative)).await?;
        self.activity_store.delete_indexed_file(relative).await?;
        Ok(())
    }

    async fn mark_error(&self, relative: &str, message: &str) -> Result<()> {
        let now = chrono::Utc::now();
        let mut file = self.activity_store.get_indexed_file(relative).await?.unwrap_or(IndexedFile {
            filepath: relative.to_owned(),
            content_hash: String::new(),
            mtime: now,
            chunk_count: 0,
            last_indexed_at: now,
            last_error: None,
        });
        file.last_error = Some(message.to_owned());
        self.activity_store.upsert_indexed_file(file).await?;
        Ok(())
    }

    /// Gitignore-aware, exclusion-policy-aware file enumeration (spec.md
    /// §4.6 step 1): a candidate is included iff it is not matched by any
    /// excluded glob AND (it is matched by a managed include OR not
    /// ignored by the project's `.gitignore`).
    fn enumerate_candidates(&self) -> Result<Vec<String>> {
        let gitignore = load_gitignore(&self.project_root);

        let mut builder = WalkBuilder::new(&self.project_root);
        builder.hidden(false).git_ignore(false).git_global(false).git_exclude(false).parents(false);

        let mut out = Vec::new();
        for entry in builder.build() {
            let entry = entry.map_err(|e| Error::Store { message: format!("index walk failed: {e}") })?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.project_root) else { continue };
            if self.policy.is_excluded(relative) {
                continue;
            }
            let managed = self.policy.is_managed(relative);
            let gitignored = gitignore.matched(relative, false).is_ignore();
            if managed || !gitignored {
                out.push(relative.to_string_lossy().into_owned());
            }
        }
        Ok(out)
    }
}

fn load_gitignore(root: &Path) -> ignore::gitignore::Gitignore {
    let mut builder = ignore::gitignore::GitignoreBuilder::new(root);
    let _ = builder.add(root.join(".gitignore"));
    builder.build().unwrap_or_else(|_| ignore::gitignore::GitignoreBuilder::new(root).build().expect("empty gitignore always builds"))
}

fn build_chunks(chunker: &dyn Chunker, filepath: &str, content: &str) -> Result<Vec<CodeChunk>> {
    let raw: Vec<Chunk> = chunker.chunk(filepath, content)?;
    Ok(raw
        .into_iter()
        .map(|chunk| CodeChunk {
            id: ChunkId::new(),
            filepath: filepath.to_owned(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            symbol_name: chunk.symbol_name,
            content_hash: hex::encode(Sha256::digest(chunk.content.as_bytes())),
            content: chunk.content,
        })
        .collect())
}

fn chunk_metadata(chunk: &CodeChunk) -> std::collections::HashMap<String, serde_json::Value> {
    let mut map = std::collections::HashMap::new();
    map.insert(metadata::FILEPATH.to_owned(), chunk.filepath.clone().into());
    map.insert(metadata::START_LINE.to_owned(), chunk.start_line.into());
    map.insert(metadata::END_LINE.to_owned(), chunk.end_line.into());
    map.insert(metadata::CONTENT_HASH.to_owned(), chunk.content_hash.clone().into());
    if let Some(symbol) = &chunk.symbol_name {
        map.insert(metadata::SYMBOL_NAME.to_owned(), symbol.clone().into());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oak_ci_domain::entities::{
        Activity, Observation, PromptBatch, PromptBatchClassification, PromptSourceType, Session,
    };
    use oak_ci_domain::ports::{ObservationFilter, SearchResult, StaleRecoveryOutcome};
    use oak_ci_domain::value_objects::{BatchId, ObservationId, SessionId};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast;

    struct LineChunker;

    impl Chunker for LineChunker {
        fn chunk(&self, _filepath: &str, content: &str) -> Result<Vec<Chunk>> {
            if content.is_empty() {
                return Ok(vec![]);
            }
            Ok(vec![Chunk { symbol_name: None, start_line: 1, end_line: content.lines().count(), content: content.to_owned() }])
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2]).collect())
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

    #[derive(Default)]
    struct StubVectorStore {
        items: StdMutex<HashMap<String, VectorItem>>,
    }

    #[async_trait]
    impl VectorStore for StubVectorStore {
        async fn add(&self, _collection: Collection, items: Vec<VectorItem>) -> Result<()> {
            let mut guard = self.items.lock().unwrap();
            for item in items {
                guard.insert(item.id.clone(), item);
            }
            Ok(())
        }
        async fn delete(&self, _collection: Collection, filter: &SearchFilter) -> Result<usize> {
            let mut guard = self.items.lock().unwrap();
            let before = guard.len();
            guard.retain(|_, item| !filter.matches(&item.metadata));
            Ok(before - guard.len())
        }
        async fn search(
            &self,
            _collection: Collection,
            _query_embedding: &[f32],
            _k: usize,
            _filter: Option<&SearchFilter>,
            _min_score: Option<f32>,
        ) -> Result<Vec<SearchResult>> {
            Ok(vec![])
        }
        async fn stats(&self, _collection: Collection) -> Result<(usize, usize)> {
            Ok((self.items.lock().unwrap().len(), 0))
        }
        async fn reset(&self, _collection: Collection) -> Result<()> {
            self.items.lock().unwrap().clear();
            Ok(())
        }
        async fn dimension(&self, _collection: Collection) -> Result<Option<usize>> {
            Ok(Some(2))
        }
    }

    #[derive(Default)]
    struct StubActivityStore {
        files: StdMutex<HashMap<String, IndexedFile>>,
    }

    #[async_trait]
    impl ActivityStore for StubActivityStore {
        async fn create_session(&self, session: Session) -> Result<Session> {
            Ok(session)
        }
        async fn get_session(&self, _id: &SessionId) -> Result<Option<Session>> {
            Ok(None)
        }
        async fn update_session(&self, session: Session) -> Result<Session> {
            Ok(session)
        }
        async fn end_session(&self, _id: &SessionId, _now: chrono::DateTime<chrono::Utc>) -> Result<Session> {
            unimplemented!("not exercised by indexing_service tests")
        }
        async fn reactivate_if_needed(&self, _id: &SessionId, _now: chrono::DateTime<chrono::Utc>) -> Result<Session> {
            unimplemented!("not exercised by indexing_service tests")
        }
        async fn ensure_session_exists(
            &self,
            _id: &SessionId,
            _agent: &str,
            _project_root: &str,
            _now: chrono::DateTime<chrono::Utc>,
        ) -> Result<Session> {
            unimplemented!("not exercised by indexing_service tests")
        }
        async fn delete_session_cascade(&self, _id: &SessionId) -> Result<()> {
            Ok(())
        }
        async fn list_sessions(&self, _agent: Option<&str>, _limit: i64, _offset: i64) -> Result<Vec<Session>> {
            Ok(vec![])
        }
        async fn get_stale_sessions(&self, _timeout: chrono::Duration, _now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Session>> {
            Ok(vec![])
        }
        async fn create_batch(
            &self,
            _session_id: &SessionId,
            _user_prompt: &str,
            _source_type: PromptSourceType,
            _plan_content: Option<String>,
            _now: chrono::DateTime<chrono::Utc>,
        ) -> Result<PromptBatch> {
            unimplemented!("not exercised by indexing_service tests")
        }
        async fn get_batch(&self, _id: &BatchId) -> Result<Option<PromptBatch>> {
            Ok(None)
        }
        async fn classify_batch(&self, _batch_id: &BatchId, _label: PromptBatchClassification) -> Result<()> {
            Ok(())
        }
        async fn set_plan_embedded(&self, _batch_id: &BatchId, _embedded: bool) -> Result<()> {
            Ok(())
        }
        async fn get_batches_needing_plan_embedding(&self) -> Result<Vec<PromptBatch>> {
            Ok(vec![])
        }
        async fn get_batches_needing_classification(&self, _older_than: chrono::DateTime<chrono::Utc>) -> Result<Vec<PromptBatch>> {
            Ok(vec![])
        }
        async fn list_batches_for_session(&self, _session_id: &SessionId) -> Result<Vec<PromptBatch>> {
            Ok(vec![])
        }
        async fn list_plan_batches(&self, _session_id: Option<&SessionId>, _limit: i64, _offset: i64) -> Result<Vec<PromptBatch>> {
            Ok(vec![])
        }
        async fn append_activity(&self, activity: Activity) -> Result<Activity> {
            Ok(activity)
        }
        async fn flush_activities(&self) -> Result<()> {
            Ok(())
        }
        async fn add_observation(&self, observation: Observation) -> Result<Observation> {
            Ok(observation)
        }
        async fn list_observations(&self, _filter: &ObservationFilter) -> Result<Vec<Observation>> {
            Ok(vec![])
        }
        async fn set_archived(&self, _id: &ObservationId, _archived: bool) -> Result<()> {
            Ok(())
        }
        async fn delete_observation(&self, _id: &ObservationId) -> Result<()> {
            Ok(())
        }
        async fn get_unembedded_observations(&self) -> Result<Vec<Observation>> {
            Ok(vec![])
        }
        async fn mark_observations_embedded(&self, _ids: &[ObservationId]) -> Result<()> {
            Ok(())
        }
        async fn search_fts(&self, _query: &str, _limit: i64) -> Result<Vec<Observation>> {
            Ok(vec![])
        }
        async fn upsert_indexed_file(&self, file: IndexedFile) -> Result<IndexedFile> {
            self.files.lock().unwrap().insert(file.filepath.clone(), file.clone());
            Ok(file)
        }
        async fn get_indexed_file(&self, filepath: &str) -> Result<Option<IndexedFile>> {
            Ok(self.files.lock().unwrap().get(filepath).cloned())
        }
        async fn delete_indexed_file(&self, filepath: &str) -> Result<()> {
            self.files.lock().unwrap().remove(filepath);
            Ok(())
        }
        async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>> {
            Ok(self.files.lock().unwrap().values().cloned().collect())
        }
        async fn run_stale_recovery(&self, _timeout: chrono::Duration, _now: chrono::DateTime<chrono::Utc>) -> Result<StaleRecoveryOutcome> {
            Ok(StaleRecoveryOutcome::default())
        }
        async fn schema_version(&self) -> Result<i64> {
            Ok(1)
        }
    }

    struct NoopEventBus;

    #[async_trait]
    impl EventBus for NoopEventBus {
        async fn publish(&self, _event: DomainEvent) {}
        fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
            broadcast::channel(1).1
        }
    }

    fn service(root: PathBuf) -> IndexingService {
        let policy = ExclusionPolicy::new(&[".git/**".to_owned()], &[]).unwrap();
        IndexingService::new(
            root,
            policy,
            true,
            Arc::new(StubActivityStore::default()),
            Arc::new(StubVectorStore::default()),
            Arc::new(StubEmbedder),
            Arc::new(LineChunker),
            Arc::new(NoopEventBus),
        )
    }

    #[tokio::test]
    async fn full_index_skips_unchanged_file_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        let svc = service(dir.path().to_path_buf());

        let first = svc.full_index().await.unwrap();
        assert_eq!(first.files_indexed, 1);

        let second = svc.full_index().await.unwrap();
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_skipped, 1);
    }

    #[tokio::test]
    async fn full_index_sweeps_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn a() {}\n").unwrap();
        let svc = service(dir.path().to_path_buf());
        svc.full_index().await.unwrap();

        std::fs::remove_file(&path).unwrap();
        svc.full_index().await.unwrap();

        assert!(svc.activity_store.list_indexed_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_change_deleted_removes_shadow_row() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        let svc = service(dir.path().to_path_buf());
        svc.full_index().await.unwrap();

        svc.apply_change(FileChangeEvent {
            sequence: 1,
            kind: FileChangeKind::Deleted,
            path: PathBuf::from("a.rs"),
            previous_path: None,
        })
        .await
        .unwrap();

        assert!(svc.activity_store.get_indexed_file("a.rs").await.unwrap().is_none());
    }
}
