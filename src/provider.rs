//! Model provider abstraction and the OpenAI-backed implementation.
//!
//! The [`ModelProvider`] trait is the engine's only window onto the model
//! backend: batched embeddings plus chat completion with token-usage
//! accounting. The concrete [`OpenAiProvider`] calls the OpenAI
//! `/v1/embeddings` and `/v1/chat/completions` endpoints.
//!
//! # Retry strategy
//!
//! Transient failures use bounded exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A malformed 200 body (no choices, no embedding data) is
//! [`EngineError::InvalidResponse`], never coerced to an empty result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{EngineError, Result};
use crate::models::Usage;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Role of a message sent to the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Result of one completion call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// Interface the engine requires from a pluggable model backend.
///
/// Implementations hold connection configuration only; no state is
/// carried between calls.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Embedding vector dimensionality, fixed for the corpus lifetime.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input in the same order.
    ///
    /// An empty input yields an empty output without a backend call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text. Equivalent to `embed_batch([text])[0]`.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EngineError::InvalidResponse(format!(
                "expected 1 embedding, got {}",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }

    /// Run a chat completion over an ordered message list.
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<Completion>;
}

/// Model provider backed by the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable. The request
/// timeout, retry budget, and models come from [`ProviderConfig`].
pub struct OpenAiProvider {
    config: ProviderConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EngineError::ProviderUnavailable("OPENAI_API_KEY environment variable not set".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    /// POST a JSON body with bounded exponential backoff on transient
    /// failures. Returns the parsed JSON of the first 2xx response.
    async fn post_with_retry(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.endpoint(path);
        let mut last_err: Option<EngineError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, delay_secs = delay.as_secs(), %url, "retrying provider call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<serde_json::Value>()
                            .await
                            .map_err(|e| EngineError::InvalidResponse(e.to_string()));
                    }

                    let body_text = response.text().await.unwrap_or_default();

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(EngineError::ProviderUnavailable(format!(
                            "{} returned {}: {}",
                            url, status, body_text
                        )));
                        continue;
                    }

                    // Client error (auth, bad request): don't retry
                    return Err(EngineError::ProviderUnavailable(format!(
                        "{} returned {}: {}",
                        url, status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(EngineError::ProviderUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            EngineError::ProviderUnavailable("provider call failed after retries".into())
        }))
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn dims(&self) -> usize {
        self.config.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.config.embed_model,
            "input": texts,
        });

        debug!(count = texts.len(), model = %self.config.embed_model, "embedding batch");
        let json = self.post_with_retry("embeddings", &body).await?;
        let vectors = parse_embeddings(&json)?;

        if vectors.len() != texts.len() {
            return Err(EngineError::InvalidResponse(format!(
                "embedding count mismatch: sent {}, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for v in &vectors {
            if v.len() != self.config.dims {
                return Err(EngineError::InvalidResponse(format!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    self.config.dims,
                    v.len()
                )));
            }
        }

        Ok(vectors)
    }

    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<Completion> {
        let body = serde_json::json!({
            "model": self.config.chat_model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.config.max_tokens,
        });

        debug!(model = %self.config.chat_model, temperature, "chat completion");
        let json = self.post_with_retry("chat/completions", &body).await?;
        parse_completion(&json)
    }
}

/// OpenAI embeddings response shape.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingsResponse = serde_json::from_value(json.clone())
        .map_err(|e| EngineError::InvalidResponse(format!("malformed embeddings body: {}", e)))?;

    if response.data.is_empty() {
        return Err(EngineError::InvalidResponse(
            "embeddings response contained no data".into(),
        ));
    }

    // Order by index so output matches input order
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

/// OpenAI chat completion response shape.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn parse_completion(json: &serde_json::Value) -> Result<Completion> {
    let response: CompletionResponse = serde_json::from_value(json.clone())
        .map_err(|e| EngineError::InvalidResponse(format!("malformed completion body: {}", e)))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            EngineError::InvalidResponse("completion response contained no choices".into())
        })?;

    let usage = response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(Completion { text, usage })
}
