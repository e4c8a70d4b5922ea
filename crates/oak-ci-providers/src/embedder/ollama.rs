//! Ollama `/api/embed` provider.

use async_trait::async_trait;
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::Embedder;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::http_batch::{embed_in_batches, DEFAULT_BATCH_SIZE};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by a local Ollama daemon.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: OnceLock<usize>,
    context_tokens: usize,
}

impl OllamaEmbedder {
    /// Build a new provider. If `dimensions` is `None`, it is discovered
    /// lazily on first call via a one-token probe embed.
    #[must_use]
    pub fn new(base_url: &str, model: &str, dimensions: Option<usize>, context_tokens: usize) -> Self {
        let cell = OnceLock::new();
        if let Some(d) = dimensions {
            let _ = cell.set(d);
        }
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            dimensions: cell,
            context_tokens,
        }
    }

    async fn raw_embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Store { message: e.to_string() })?;
        let parsed: EmbedResponse = resp
            .error_for_status()
            .map_err(|e| Error::Store { message: e.to_string() })?
            .json()
            .await
            .map_err(|e| Error::Store { message: e.to_string() })?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let result = embed_in_batches(texts, DEFAULT_BATCH_SIZE, "ollama", |batch| self.raw_embed(batch)).await?;
        if let Some(first) = result.first() {
            let _ = self.dimensions.set(first.len());
        }
        Ok(result)
    }

    fn dimensions(&self) -> usize {
        *self.dimensions.get().unwrap_or(&0)
    }

    fn context_window(&self) -> usize {
        self.context_tokens
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}
