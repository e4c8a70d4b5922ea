//! Port traits: the seams every other layer is wired through.

mod activity_store;
mod chunker;
mod embedder;
mod event_bus;
mod summarizer;
mod vector_store;
mod watcher;

pub use activity_store::{
    ActivityStore, ObservationFilter, StaleRecoveryOutcome,
};
pub use chunker::{Chunk, Chunker};
pub use embedder::Embedder;
pub use event_bus::{DomainEvent, EventBus, IndexingProgress};
pub use summarizer::{CompletionRequest, Summarizer};
pub use vector_store::{
    Collection, SearchFilter, SearchResult, VectorItem, VectorStore,
};
pub use watcher::{FileChangeEvent, FileChangeKind, Watcher};
