//! [`Embedder`] implementations (spec.md §4.2).

#[cfg(feature = "local-embeddings")]
mod fastembed_local;
mod http_batch;
mod ollama;
mod openai_compat;

pub use ollama::OllamaEmbedder;
pub use openai_compat::OpenAiCompatEmbedder;

#[cfg(feature = "local-embeddings")]
pub use fastembed_local::FastEmbedLocalEmbedder;

use oak_ci_domain::ports::Embedder;
use std::sync::Arc;

/// Which provider family an [`Embedder`] belongs to, carried alongside the
/// trait object for observability (spec.md §9 "Dynamic dispatch across
/// providers" — capability set with a variant tag, no inheritance).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Local Ollama daemon.
    Ollama,
    /// Any OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAiCompatible,
    /// LM Studio, also OpenAI-compatible but tagged separately so metrics
    /// can distinguish it.
    LmStudio,
    /// In-process fastembed model, no network round trip.
    FastEmbed,
}

/// Build an [`Embedder`] for the named provider kind against the given
/// endpoint/model.
///
/// # Errors
///
/// Returns [`oak_ci_domain::error::Error::ConfigError`] if `kind` requires
/// a feature this build was compiled without.
pub fn build_embedder(
    kind: EmbedderKind,
    base_url: &str,
    model: &str,
    dimensions: Option<usize>,
    context_tokens: usize,
) -> oak_ci_domain::error::Result<Arc<dyn Embedder>> {
    match kind {
        EmbedderKind::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            base_url,
            model,
            dimensions,
            context_tokens,
        ))),
        EmbedderKind::OpenAiCompatible => Ok(Arc::new(OpenAiCompatEmbedder::new(
            "openai",
            base_url,
            model,
            dimensions,
            context_tokens,
        ))),
        EmbedderKind::LmStudio => Ok(Arc::new(OpenAiCompatEmbedder::new(
            "lmstudio",
            base_url,
            model,
            dimensions,
            context_tokens,
        ))),
        #[cfg(feature = "local-embeddings")]
        EmbedderKind::FastEmbed => Ok(Arc::new(FastEmbedLocalEmbedder::new(model)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbedderKind::FastEmbed => Err(oak_ci_domain::error::Error::ConfigError {
            message: "fastembed provider requires the `local-embeddings` build feature".to_owned(),
        }),
    }
}
