//! Text -> vector provider contract (spec.md §4.2).

use async_trait::async_trait;

use crate::error::Result;

/// Pluggable text embedding provider.
///
/// Implementations batch internally to the provider's limit and surface one
/// [`crate::error::Error::BatchTooLarge`] / [`crate::error::Error::ProviderUnreachable`]
/// per failed batch rather than failing the whole call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// Maximum input context window, in tokens, this provider supports.
    fn context_window(&self) -> usize;

    /// Stable name for observability (e.g. "ollama", "openai").
    fn provider_name(&self) -> &str;
}
