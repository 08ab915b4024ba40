//! HTTP LLM adapter.
//!
//! An OpenAI-compatible chat-completions client behind the LLM port,
//! rate-limited with a token bucket and retried with exponential
//! backoff on transient transport failures. A missing API key degrades
//! construction to the null client with a warning.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::LlmConfig;
use crate::domain::ports::{LlmClient, NullLlmClient, SyndicateError, SyndicateResult};

/// Upper bound on total retry time for one completion.
const RETRY_BUDGET: Duration = Duration::from_secs(30);
/// First retry delay.
const RETRY_INITIAL: Duration = Duration::from_millis(500);

/// Chat-completions client over HTTP.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    limiter: DefaultDirectRateLimiter,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig, api_key: String) -> SyndicateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyndicateError::DependencyMissing(format!("http client: {e}")))?;
        let rps = NonZeroU32::new(config.requests_per_second.max(1))
            .expect("clamped to at least 1");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    async fn request_once(&self, body: &Value) -> SyndicateResult<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| SyndicateError::ExecutionFailure(format!("llm request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyndicateError::ExecutionFailure(format!(
                "llm returned {status}: {text}"
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| SyndicateError::Serialization(format!("llm response: {e}")))?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SyndicateError::Serialization("llm response missing message content".into())
            })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &str, model: Option<&str>) -> SyndicateResult<String> {
        self.limiter.until_ready().await;

        let body = json!({
            "model": model.unwrap_or(&self.model),
            "messages": [{ "role": "user", "content": prompt }],
        });

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(RETRY_INITIAL)
            .with_max_elapsed_time(Some(RETRY_BUDGET))
            .build();

        let reply = backoff::future::retry(policy, || async {
            match self.request_once(&body).await {
                Ok(content) => Ok(content),
                Err(e) => {
                    let text = e.to_string();
                    // Server-side and transport failures are worth retrying
                    let transient = text.contains("request failed")
                        || text.contains(" 429")
                        || text.contains(" 500")
                        || text.contains(" 502")
                        || text.contains(" 503")
                        || text.contains(" 504");
                    if transient {
                        debug!(error = %text, "transient llm failure, will retry");
                        Err(backoff::Error::transient(e))
                    } else {
                        Err(backoff::Error::permanent(e))
                    }
                }
            }
        })
        .await?;

        Ok(reply)
    }
}

/// Builds the configured LLM client, degrading to null when no API key
/// is available (config first, then `SYNDICATE_LLM_API_KEY`).
pub fn from_config(config: &LlmConfig) -> Arc<dyn LlmClient> {
    let api_key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("SYNDICATE_LLM_API_KEY").ok());

    match api_key {
        Some(key) if !key.is_empty() => match HttpLlmClient::new(config, key) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!(error = %e, "llm client construction failed, degrading to null");
                Arc::new(NullLlmClient)
            }
        },
        _ => {
            warn!("no LLM API key configured, chat ability will be unavailable");
            Arc::new(NullLlmClient)
        }
    }
}
