//! Embedding provider abstraction and implementations.
//!
//! [`EmbeddingProvider`] is the single seam between the pipeline and the
//! embedding backend. The same provider must serve index builds and queries;
//! the retriever enforces that by comparing model names against the index
//! header and failing fast on a mismatch.
//!
//! Implementations:
//! - [`OpenAiEmbeddings`] — calls the OpenAI embeddings API with batching
//!   and bounded retry/backoff.
//! - [`mock::MockEmbeddings`] — deterministic bag-of-words vectors for tests
//!   and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, Result};

/// Bounded retry with exponential backoff and jitter, shared by every
/// network provider. Expressed as a value so retry behavior is testable
/// independent of any HTTP call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retry entirely.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(500),
            jitter: true,
        }
    }

    /// Delay before retry `attempt` (1-based): base × 2^(attempt−1), capped
    /// at 2^5 × base, plus up to 50% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = (attempt.saturating_sub(1)).min(5);
        let base = self.base_delay * 2u32.pow(exp);
        if self.jitter {
            let extra = base.as_millis() as u64 / 2;
            base + Duration::from_millis(fastrand::u64(0..=extra))
        } else {
            base
        }
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded in the index header.
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vectors = provider.embed_batch(&[text.to_string()]).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::provider(provider.model_name(), "empty embedding response"))
}

/// Cosine similarity between two embedding vectors, in `[-1, 1]`.
/// Returns `0.0` for empty or mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

// ============ OpenAI provider ============

pub struct OpenAiEmbeddings {
    model: String,
    dims: usize,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PipelineError::InvalidArgument("OPENAI_API_KEY environment variable not set".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::provider(&config.model, e))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            base_url: "https://api.openai.com".to_string(),
            client,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    /// Point the provider at a different endpoint. Used by tests against a
    /// local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err: Option<PipelineError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay(attempt)).await;
                debug!(attempt, model = %self.model, "retrying embedding call");
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| PipelineError::provider(&self.model, e))?;
                        return parse_embeddings_response(&self.model, &json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    // Rate limits and server errors are transient.
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(PipelineError::provider(
                            &self.model,
                            format!("HTTP {}: {}", status, body_text),
                        ));
                        continue;
                    }
                    return Err(PipelineError::provider(
                        &self.model,
                        format!("HTTP {}: {}", status, body_text),
                    ));
                }
                Err(e) => {
                    last_err = Some(PipelineError::provider(&self.model, e));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::provider(&self.model, "retries exhausted")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.call_api(texts).await
    }
}

fn parse_embeddings_response(model: &str, json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| PipelineError::provider(model, "missing data array in response"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| PipelineError::provider(model, "missing embedding in response"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Deterministic mock ============

pub mod mock {
    //! Deterministic embedding provider for tests and offline runs.
    //!
    //! Texts sharing more words get closer vectors, so relevance ordering in
    //! tests behaves the way a real embedding space does, without network.

    use super::*;

    pub struct MockEmbeddings {
        dims: usize,
    }

    impl MockEmbeddings {
        pub fn new(dims: usize) -> Self {
            Self { dims: dims.max(8) }
        }

        fn embed_one(&self, text: &str) -> Vec<f32> {
            let mut vec = vec![0.0f32; self.dims];
            for token in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let mut h: u64 = 0xcbf29ce484222325;
                for b in token.bytes() {
                    h ^= u64::from(b);
                    h = h.wrapping_mul(0x100000001b3);
                }
                vec[(h % self.dims as u64) as usize] += 1.0;
            }
            let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > f32::EPSILON {
                for v in &mut vec {
                    *v /= norm;
                }
            }
            vec
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddings {
        fn model_name(&self) -> &str {
            "mock"
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.embed_one(t)).collect())
        }
    }
}

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<std::sync::Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(std::sync::Arc::new(OpenAiEmbeddings::new(config)?)),
        "mock" => Ok(std::sync::Arc::new(mock::MockEmbeddings::new(config.dims))),
        other => Err(PipelineError::InvalidArgument(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}
