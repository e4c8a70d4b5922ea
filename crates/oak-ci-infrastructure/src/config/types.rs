//! The merged, immutable configuration snapshot (spec.md §4.1).

use serde::{Deserialize, Serialize};

/// Daemon bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Port to bind the HTTP surface on. `0` means "pick any free port".
    #[serde(default)]
    pub port: u16,
    /// Host/interface to bind. Defaults to loopback.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: 0,
            host: default_host(),
        }
    }
}

/// Exclusion/inclusion policy and managed paths (spec.md §4.1, §4.6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Glob patterns unioned with the built-in exclusion set and the
    /// project's `.gitignore`.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    /// Glob patterns that are always indexed regardless of `.gitignore`.
    #[serde(default = "default_managed_paths")]
    pub include_managed_paths: Vec<String>,
    /// Whether empty files count toward `files_indexed` (spec.md §9 Open
    /// Question (a), resolved in DESIGN.md: current behavior counts them).
    #[serde(default = "default_true")]
    pub skip_empty: bool,
}

fn default_true() -> bool {
    true
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        ".oak/**".to_owned(),
        ".venv/**".to_owned(),
        "node_modules/**".to_owned(),
        ".git/**".to_owned(),
        "target/**".to_owned(),
    ]
}

fn default_managed_paths() -> Vec<String> {
    vec![".claude/commands/**".to_owned(), ".claude/skills/**".to_owned()]
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            include_managed_paths: default_managed_paths(),
            skip_empty: true,
        }
    }
}

/// Embedding provider selection (spec.md §4.1, §4.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider family: `ollama | openai | lmstudio | fastembed`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Base URL for HTTP providers; ignored for `fastembed`.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model name/identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension, discovered at runtime if absent.
    pub dimensions: Option<usize>,
    /// Provider's context window, in tokens.
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,
}

fn default_embedding_provider() -> String {
    "ollama".to_owned()
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_owned()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_owned()
}

fn default_context_tokens() -> usize {
    8192
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimensions: None,
            context_tokens: default_context_tokens(),
        }
    }
}

/// Summarization provider selection (spec.md §4.1, §4.10).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Provider family, same vocabulary as [`EmbeddingConfig::provider`]
    /// minus `fastembed` (no local completion provider is bundled).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Base URL for the completion endpoint.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model name/identifier.
    #[serde(default = "default_summarization_model")]
    pub model: String,
    /// Provider's context window, in tokens.
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,
}

fn default_summarization_model() -> String {
    "llama3.1".to_owned()
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_ollama_url(),
            model: default_summarization_model(),
            context_tokens: default_context_tokens(),
        }
    }
}

/// Session lifecycle tuning (spec.md §4.1, §4.5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which an active session is stale.
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_seconds: i64,
}

fn default_stale_timeout() -> i64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_timeout_seconds: default_stale_timeout(),
        }
    }
}

/// Retrieval confidence thresholds (spec.md §4.1, §4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Similarity at/above which a result is `high` confidence.
    #[serde(default = "default_high_confidence")]
    pub high_confidence_threshold: f32,
    /// Similarity at/above which a result is `medium` confidence.
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence_threshold: f32,
}

fn default_high_confidence() -> f32 {
    0.75
}

fn default_medium_confidence() -> f32 {
    0.5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: default_high_confidence(),
            medium_confidence_threshold: default_medium_confidence(),
        }
    }
}

/// Optional outbound cloud relay settings (spec.md §4.12, §6.5).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Relay `/ws` endpoint; relay is disabled if absent.
    pub url: Option<String>,
    /// Token presented on the outbound websocket connection.
    pub relay_token: Option<String>,
}

/// The full, merged, immutable configuration snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Daemon bind settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Exclusion/inclusion policy.
    #[serde(default)]
    pub indexing: IndexingConfig,
    /// Embedding provider selection.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Summarization provider selection.
    #[serde(default)]
    pub summarization: SummarizationConfig,
    /// Session lifecycle tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// Retrieval confidence thresholds.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Optional cloud relay settings.
    #[serde(default)]
    pub relay: RelayConfig,
}
