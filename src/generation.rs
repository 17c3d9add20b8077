//! Chat-completion provider abstraction and the LLM-backed language
//! classifier built on top of it.
//!
//! Mirrors the embedding layer: one trait, an OpenAI implementation with
//! bounded retry, and a deterministic mock for tests.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::embedding::RetryPolicy;
use crate::error::{PipelineError, Result};
use crate::language::LanguageClassifier;
use crate::models::Language;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Run one chat completion and return the assistant message text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

pub fn create_provider(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "mock" => Ok(Arc::new(mock::MockGeneration::default())),
        other => Err(PipelineError::InvalidArgument(format!(
            "unknown generation provider: {other}"
        ))),
    }
}

// ============ OpenAI provider ============

pub struct OpenAiChat {
    model: String,
    temperature: f32,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PipelineError::InvalidArgument("OPENAI_API_KEY environment variable not set".into())
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::provider(&config.model, e))?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
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

    async fn call_api(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let mut last_err: Option<PipelineError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay(attempt)).await;
                debug!(attempt, model = %self.model, "retrying chat completion");
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
                        return parse_chat_response(&self.model, &json);
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
impl GenerationProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.call_api(system, user).await
    }
}

fn parse_chat_response(model: &str, json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| PipelineError::provider(model, "missing message content in response"))
}

// ============ LLM language classifier ============

const CLASSIFY_SYSTEM: &str = "You identify the language of short text fragments. \
Reply with only the two-letter ISO 639-1 code of the language, nothing else. \
If you cannot tell, reply \"und\".";

/// Precise classifier for short or ambiguous input, backed by a chat model.
pub struct LlmClassifier {
    provider: Arc<dyn GenerationProvider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LanguageClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> Result<Language> {
        let reply = self.provider.complete(CLASSIFY_SYSTEM, text).await?;
        let code = reply
            .split_whitespace()
            .next()
            .unwrap_or("und")
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_lowercase();
        debug!(code = %code, "classifier reply");
        Ok(Language::from_code(&code))
    }
}

// ============ Deterministic mock ============

pub mod mock {
    //! Canned-response provider for tests and offline runs.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::GenerationProvider;
    use crate::error::Result;

    /// Replies with a fixed string, recording every call. The default reply
    /// is a plausible translation so orchestrator tests get non-empty output;
    /// classification tests override it with a language code.
    pub struct MockGeneration {
        reply: String,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Default for MockGeneration {
        fn default() -> Self {
            Self::with_reply("¿Cómo andás?")
        }
    }

    impl MockGeneration {
        pub fn with_reply(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().expect("mock lock poisoned").len()
        }

        /// The `(system, user)` message pair of the most recent call.
        pub fn last_call(&self) -> Option<(String, String)> {
            self.calls
                .lock()
                .expect("mock lock poisoned")
                .last()
                .cloned()
        }
    }

    #[async_trait]
    impl GenerationProvider for MockGeneration {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, system: &str, user: &str) -> Result<String> {
            self.calls
                .lock()
                .expect("mock lock poisoned")
                .push((system.to_string(), user.to_string()));
            Ok(self.reply.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    fn quick_config() -> GenerationConfig {
        GenerationConfig {
            provider: "openai".into(),
            max_retries: 1,
            ..GenerationConfig::default()
        }
    }

    fn quick_chat(server_uri: &str) -> OpenAiChat {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let mut chat = OpenAiChat::new(&quick_config()).unwrap().with_base_url(server_uri);
        chat.retry.base_delay = std::time::Duration::from_millis(1);
        chat.retry.jitter = false;
        chat
    }

    #[test]
    fn test_parse_chat_response() {
        let json = chat_body("che, todo bien");
        assert_eq!(parse_chat_response("m", &json).unwrap(), "che, todo bien");

        let bad = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response("m", &bad).is_err());
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hola")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = quick_chat(&server.uri());
        let reply = chat.complete("sys", "hello").await.unwrap();
        assert_eq!(reply, "hola");
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let chat = quick_chat(&server.uri());
        let err = chat.complete("sys", "hello").await.unwrap_err();
        assert!(matches!(err, PipelineError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_llm_classifier_parses_code() {
        let provider = Arc::new(mock::MockGeneration::with_reply("ES\n"));
        let classifier = LlmClassifier::new(provider);
        assert_eq!(classifier.classify("che").await.unwrap(), Language::Es);

        let provider = Arc::new(mock::MockGeneration::with_reply("fr"));
        let classifier = LlmClassifier::new(provider);
        assert_eq!(
            classifier.classify("oui").await.unwrap(),
            Language::Unsupported("fr".into())
        );
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let provider = mock::MockGeneration::default();
        provider.complete("sys", "user").await.unwrap();
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_call().unwrap().1, "user");
    }
}
