//! Merged project+user configuration (spec.md §4.1).

mod loader;
mod paths;
mod types;

pub use loader::{detect_embedding_provider, ConfigLoader};
pub use paths::{ProjectPaths, OAK_DIR};
pub use types::{
    AppConfig, DaemonConfig, EmbeddingConfig, IndexingConfig, RelayConfig, RetrievalConfig,
    SessionConfig, SummarizationConfig,
};
