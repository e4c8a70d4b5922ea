//! Shared batching helper for HTTP-backed embedder providers.

use oak_ci_domain::error::{Error, Result};

/// Maximum number of texts sent to an HTTP embedder in one request. Chosen
/// conservatively; real providers' limits vary, but this keeps individual
/// request bodies small regardless.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Split `texts` into batches of at most `batch_size`, call `embed_one` for
/// each batch, and concatenate the results in order. A single failing batch
/// surfaces one error for the whole call (spec.md §4.2).
pub async fn embed_in_batches<F, Fut>(
    texts: &[String],
    batch_size: usize,
    provider: &str,
    mut embed_one: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Vec<f32>>>>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_result = embed_one(chunk.to_vec()).await.map_err(|source| {
            Error::ProviderUnreachable {
                provider: provider.to_owned(),
                message: source.to_string(),
            }
        })?;
        if batch_result.len() != chunk.len() {
            return Err(Error::ProviderUnreachable {
                provider: provider.to_owned(),
                message: format!(
                    "provider returned {} embeddings for {} inputs",
                    batch_result.len(),
                    chunk.len()
                ),
            });
        }
        out.extend(batch_result);
    }
    Ok(out)
}
