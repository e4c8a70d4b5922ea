//! Text completion provider contract, used by the background processor to
//! generate session titles/summaries (spec.md §4.10).

use async_trait::async_trait;

use crate::error::Result;

/// A single completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// System/instruction text.
    pub system_prompt: String,
    /// User/content text (e.g. the batch/session transcript to summarize).
    pub input: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: usize,
}

/// Pluggable text completion provider.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Run one completion and return the generated text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Maximum input context window, in tokens, this provider supports.
    fn context_window(&self) -> usize;

    /// Stable name for observability.
    fn provider_name(&self) -> &str;
}
