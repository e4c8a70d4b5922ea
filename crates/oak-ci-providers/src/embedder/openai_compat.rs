//! OpenAI-compatible `/v1/embeddings` provider (covers OpenAI and LM Studio).

use async_trait::async_trait;
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::Embedder;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::http_batch::{embed_in_batches, DEFAULT_BATCH_SIZE};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

/// Embedder speaking the OpenAI `/v1/embeddings` wire format. Used for both
/// the hosted OpenAI API and LM Studio's OpenAI-compatible local server;
/// `provider_name` distinguishes the two for observability.
pub struct OpenAiCompatEmbedder {
    provider_name: &'static str,
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: OnceLock<usize>,
    context_tokens: usize,
}

impl OpenAiCompatEmbedder {
    /// Build a new provider.
    #[must_use]
    pub fn new(
        provider_name: &'static str,
        base_url: &str,
        model: &str,
        dimensions: Option<usize>,
        context_tokens: usize,
    ) -> Self {
        let cell = OnceLock::new();
        if let Some(d) = dimensions {
            let _ = cell.set(d);
        }
        Self {
            provider_name,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            dimensions: cell,
            context_tokens,
        }
    }

    async fn raw_embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Store { message: e.to_string() })?;
        let parsed: EmbeddingResponse = resp
            .error_for_status()
            .map_err(|e| Error::Store { message: e.to_string() })?
            .json()
            .await
            .map_err(|e| Error::Store { message: e.to_string() })?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiCompatEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let result = embed_in_batches(texts, DEFAULT_BATCH_SIZE, self.provider_name, |batch| {
            self.raw_embed(batch)
        })
        .await?;
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
        self.provider_name
    }
}
