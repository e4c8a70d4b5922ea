//! [`Summarizer`](oak_ci_domain::ports::Summarizer) implementation used by
//! the background processor for titles/summaries (spec.md §4.10).

use async_trait::async_trait;
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{CompletionRequest, Summarizer};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Summarizer speaking the OpenAI-compatible `/v1/chat/completions` wire
/// format, which Ollama, LM Studio and hosted OpenAI all implement — one
/// implementation covers every configured `summarization.provider`.
pub struct HttpChatSummarizer {
    provider_name: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    context_tokens: usize,
}

impl HttpChatSummarizer {
    /// Build a new provider.
    #[must_use]
    pub fn new(provider_name: impl Into<String>, base_url: &str, model: &str, context_tokens: usize) -> Self {
        Self {
            provider_name: provider_name.into(),
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            context_tokens,
        }
    }
}

#[async_trait]
impl Summarizer for HttpChatSummarizer {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.input,
                },
            ],
            max_tokens: request.max_output_tokens,
        };
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ProviderUnreachable {
                provider: self.provider_name.clone(),
                message: e.to_string(),
            })?;
        let parsed: ChatResponse = resp
            .error_for_status()
            .map_err(|e| Error::ProviderUnreachable {
                provider: self.provider_name.clone(),
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| Error::ProviderUnreachable {
                provider: self.provider_name.clone(),
                message: e.to_string(),
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::ProviderUnreachable {
                provider: self.provider_name.clone(),
                message: "empty choices in completion response".to_owned(),
            })
    }

    fn context_window(&self) -> usize {
        self.context_tokens
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }
}
