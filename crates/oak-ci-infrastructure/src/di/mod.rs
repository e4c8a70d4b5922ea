//! Wires every domain port to a concrete adapter for one project root.
//! The binary crate owns the application use cases; this module only
//! builds the adapters they're constructed from.

use std::path::Path;
use std::sync::Arc;

use oak_ci_domain::error::Result;
use oak_ci_domain::ports::{ActivityStore, Chunker, Embedder, EventBus, Summarizer, VectorStore, Watcher};
use oak_ci_providers::chunker::LanguageAwareChunker;
use oak_ci_providers::embedder::{build_embedder, EmbedderKind};
use oak_ci_providers::summarizer::HttpChatSummarizer;

use crate::config::{AppConfig, ProjectPaths};
use crate::database::SqliteActivityStore;
use crate::events::BroadcastEventBus;
use crate::vector::HnswVectorStore;
use crate::watcher::{ExclusionPolicy, NotifyWatcher};

/// Every adapter a running daemon needs, assembled from one [`AppConfig`].
pub struct Ports {
    pub activity_store: Arc<dyn ActivityStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub watcher: Arc<dyn Watcher>,
    pub event_bus: Arc<dyn EventBus>,
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn Summarizer>,
    pub chunker: Arc<dyn Chunker>,
}

/// Build every adapter for `project_root` given its merged configuration.
///
/// # Errors
///
/// Propagates I/O, schema-migration, or provider-configuration failures
/// encountered while opening the relational store, vector store, or
/// selected embedding/summarization provider.
pub async fn bootstrap(project_root: &Path, config: &AppConfig) -> Result<Ports> {
    let paths = ProjectPaths::new(project_root);

    let activity_store = Arc::new(SqliteActivityStore::open(&paths.activities_db()).await?);
    let vector_store = Arc::new(HnswVectorStore::open(&paths.vector_dir()).await?);

    let policy = ExclusionPolicy::from_config(&config.indexing);
    let watcher = Arc::new(NotifyWatcher::new(project_root.to_owned(), policy));

    let event_bus = Arc::new(BroadcastEventBus::new());

    let embedder_kind = embedder_kind(&config.embedding.provider)?;
    let embedder = build_embedder(
        embedder_kind,
        &config.embedding.base_url,
        &config.embedding.model,
        config.embedding.dimensions,
        config.embedding.context_tokens,
    )?;

    let summarizer = Arc::new(HttpChatSummarizer::new(
        config.summarization.provider.clone(),
        &config.summarization.base_url,
        &config.summarization.model,
        config.summarization.context_tokens,
    ));

    let chunker = Arc::new(LanguageAwareChunker::new());

    Ok(Ports {
        activity_store,
        vector_store,
        watcher,
        event_bus,
        embedder,
        summarizer,
        chunker,
    })
}

fn embedder_kind(provider: &str) -> Result<EmbedderKind> {
    match provider {
        "ollama" => Ok(EmbedderKind::Ollama),
        "openai" => Ok(EmbedderKind::OpenAiCompatible),
        "lmstudio" => Ok(EmbedderKind::LmStudio),
        "fastembed" => Ok(EmbedderKind::FastEmbed),
        other => Err(oak_ci_domain::error::Error::ConfigError {
            message: format!("unknown embedding provider '{other}'"),
        }),
    }
}
