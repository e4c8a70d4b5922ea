//! Internal progress/notification bus (spec.md §4.6 "internal bus").

use async_trait::async_trait;

/// Progress of an in-flight indexing run, consumed by the status API.
#[derive(Clone, Debug)]
pub struct IndexingProgress {
    /// Files processed so far.
    pub processed: usize,
    /// Total files discovered for this run.
    pub total: usize,
    /// Path currently being processed, if any.
    pub current_file: Option<String>,
}

/// System-wide events other components may subscribe to.
#[derive(Clone, Debug)]
pub enum DomainEvent {
    /// A full or incremental indexing run started.
    IndexingStarted {
        /// Total files discovered for this run.
        total_files: usize,
    },
    /// Progress update for an in-flight run.
    IndexingProgress(IndexingProgress),
    /// An indexing run finished.
    IndexingCompleted {
        /// Files successfully processed.
        files_indexed: usize,
        /// Files that failed (logged, run continued).
        files_failed: usize,
    },
    /// A session was recovered (completed) or deleted by the stale sweep.
    SessionRecovered {
        /// Id of the affected session.
        session_id: String,
        /// Whether the session was deleted (`true`) or just completed.
        deleted: bool,
    },
}

/// Publish/subscribe seam for [`DomainEvent`]s, decoupling producers
/// (indexer, background processor) from consumers (status API, logging).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event to all current subscribers.
    async fn publish(&self, event: DomainEvent);

    /// Subscribe to the event stream.
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DomainEvent>;
}
