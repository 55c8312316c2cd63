//! Chat completions client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DecisionProvider, DecisionRequest};
use crate::config::ProviderConfig;
use crate::error::{GameSimError, Result};

/// Retry policy for rate-limited calls.
pub trait RetryPolicy: Send + Sync {
    /// Maximum number of attempts
    fn max_attempts(&self) -> u32;
    /// Whether to retry given the attempt number and if it was a rate limit
    fn should_retry(&self, attempt: u32, is_rate_limit: bool) -> bool;
    /// Backoff duration for the given attempt
    fn backoff(&self, attempt: u32) -> Duration;
}

/// Default exponential backoff retry policy
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base backoff duration in milliseconds
    pub base_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

impl ExponentialBackoff {
    /// Policy from provider settings.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff_ms: config.base_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn should_retry(&self, attempt: u32, is_rate_limit: bool) -> bool {
        // Only rate limits are retried; anything else goes to the caller's fallback
        is_rate_limit && attempt + 1 < self.max_attempts
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self.base_backoff_ms.saturating_mul(1 << attempt.min(10));
        Duration::from_millis(backoff.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

/// API call result
enum ApiResult {
    Success { content: String, tokens: u32 },
    RateLimited,
    Error(String),
}

/// OpenAI-compatible chat completions provider.
///
/// Each request is sent as a system message (the strategy prompt) followed
/// by a user message (the call prompt). HTTP 429 responses are retried with
/// the configured [`RetryPolicy`]; every other failure is returned at once.
pub struct HttpProvider<R: RetryPolicy = ExponentialBackoff> {
    client: Client,
    config: ProviderConfig,
    retry: R,
}

impl HttpProvider {
    /// Build a provider. Fails when no API key is configured.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let retry = ExponentialBackoff::from_config(&config);
        Self::with_retry_policy(config, retry)
    }
}

impl<R: RetryPolicy> HttpProvider<R> {
    /// Build a provider with a custom retry policy.
    pub fn with_retry_policy(config: ProviderConfig, retry: R) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(GameSimError::ApiKeyMissing);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    async fn send_once(&self, request: &DecisionRequest) -> ApiResult {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            temperature: Some(self.config.temperature),
            max_completion_tokens: Some(self.config.max_tokens),
        };

        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = match self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ApiResult::Error(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return ApiResult::RateLimited;
            }
            let error_text = response.text().await.unwrap_or_default();
            return ApiResult::Error(format!("API error {}: {}", status, error_text));
        }

        match response.json::<ChatResponse>().await {
            Ok(result) => {
                let content = result
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();
                let tokens = result.usage.map(|u| u.total_tokens).unwrap_or(0);
                ApiResult::Success { content, tokens }
            },
            Err(e) => ApiResult::Error(format!("JSON parse error: {}", e)),
        }
    }
}

impl<R: RetryPolicy> DecisionProvider for HttpProvider<R> {
    async fn complete(&self, request: &DecisionRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                ApiResult::Success { content, tokens } => {
                    debug!(
                        agent = %request.agent_id,
                        call_type = %request.call_type,
                        tokens,
                        "provider call completed"
                    );
                    return Ok(content);
                },
                ApiResult::RateLimited if self.retry.should_retry(attempt, true) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        model = %request.model,
                        attempt = attempt + 1,
                        "rate limited, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                ApiResult::RateLimited => {
                    return Err(GameSimError::RateLimited {
                        model: request.model.clone(),
                        attempts: attempt + 1,
                    });
                },
                ApiResult::Error(e) => return Err(GameSimError::Provider(e)),
            }
        }
    }
}
