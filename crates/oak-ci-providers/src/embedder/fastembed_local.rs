//! In-process embedding via `fastembed`, avoiding a network round trip.
//! Gated behind the `local-embeddings` feature (spec.md §4.2, provider
//! variant `fastembed`).

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::Embedder;
use std::sync::Mutex;

/// Embedder that loads a local ONNX model via `fastembed` and runs
/// inference in-process.
pub struct FastEmbedLocalEmbedder {
    model: Mutex<TextEmbedding>,
    dimensions: usize,
    model_name: String,
}

impl FastEmbedLocalEmbedder {
    /// Load the named model. `model_name` must match one of
    /// [`fastembed::EmbeddingModel`]'s recognized names (e.g.
    /// `"BGESmallENV15"`); unrecognized names fail at construction.
    pub fn new(model_name: &str) -> Result<Self> {
        let model_enum = parse_model(model_name)?;
        let model = TextEmbedding::try_new(InitOptions::new(model_enum)).map_err(|e| Error::ConfigError {
            message: format!("failed to load fastembed model '{model_name}': {e}"),
        })?;
        let dimensions = model.embedding_size();
        Ok(Self {
            model: Mutex::new(model),
            dimensions,
            model_name: model_name.to_owned(),
        })
    }
}

fn parse_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "BGESmallENV15" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "AllMiniLML6V2" | "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => Err(Error::ConfigError {
            message: format!("unrecognized fastembed model '{other}'"),
        }),
    }
}

#[async_trait]
impl Embedder for FastEmbedLocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let guard = self
            .model
            .lock()
            .map_err(|_| Error::Store { message: "fastembed model lock poisoned".to_owned() })?;
        guard
            .embed(texts, None)
            .map_err(|e| Error::ProviderUnreachable {
                provider: "fastembed".to_owned(),
                message: e.to_string(),
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn context_window(&self) -> usize {
        512
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

impl std::fmt::Debug for FastEmbedLocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedLocalEmbedder")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
