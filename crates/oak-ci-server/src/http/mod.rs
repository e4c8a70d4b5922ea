//! HTTP surface (spec.md §6.1): hook endpoints, the status/health API, and
//! the relational/vector read/export surface used by the CLI.

mod dto;
mod handlers;
mod status;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, post, put};
use axum::Router;

use oak_ci_application::{HookIngestionService, IndexingService, RetrievalService};
use oak_ci_domain::ports::{ActivityStore, Embedder, VectorStore};
use oak_ci_infrastructure::config::ConfigLoader;

pub use status::{DaemonStatus, DaemonStatusValue};

/// Shared state every handler reads from. Cheap to clone (every field is an
/// `Arc`), matching axum's `State<T: Clone>` requirement.
#[derive(Clone)]
pub struct AppState {
    pub activity_store: Arc<dyn ActivityStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub hook_ingestion: Arc<HookIngestionService>,
    pub retrieval: Arc<RetrievalService>,
    pub indexing: Arc<IndexingService>,
    pub status: Arc<DaemonStatus>,
    pub started_at: Instant,
    pub config_loader: Arc<ConfigLoader>,
}

/// Build the daemon's full router (spec.md §6.1). Every hook handler is
/// best-effort: `oak_ci_domain::warn!` logs the failure and the handler
/// still returns `200 {}` (spec.md §4.9 "Failure semantics").
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/oak/ci/session-start", post(handlers::session_start))
        .route("/api/oak/ci/session-end", post(handlers::session_end))
        .route("/api/oak/ci/prompt-submit", post(handlers::prompt_submit))
        .route("/api/oak/ci/post-tool-use", post(handlers::post_tool_use))
        .route("/api/oak/ci/post-tool-use-failure", post(handlers::post_tool_use_failure))
        .route("/api/oak/ci/subagent-start", post(handlers::subagent_start))
        .route("/api/oak/ci/subagent-stop", post(handlers::subagent_stop))
        .route("/api/activity/sessions", get(handlers::list_sessions))
        .route("/api/activity/sessions/:id", get(handlers::get_session))
        .route("/api/activity/sessions/:id", delete(handlers::delete_session))
        .route("/api/activity/plans", get(handlers::list_plans))
        .route("/api/activity/plans/:id", delete(handlers::delete_plan))
        .route("/api/search/memories", get(handlers::list_memories))
        .route("/api/search/memories/bulk", post(handlers::bulk_memories))
        .route("/api/search", get(handlers::unified_search))
        .route("/api/index", post(handlers::trigger_index))
        .route("/api/backup/export", post(handlers::backup_export))
        .route("/api/backup/import", post(handlers::backup_import))
        .route("/api/config", get(handlers::get_config))
        .route("/api/config", put(handlers::put_config))
        .route("/api/config/test-detect", post(handlers::test_detect_config))
        .with_state(state)
}
