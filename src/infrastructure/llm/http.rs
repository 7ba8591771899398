//! HTTP LLM client.
//!
//! Messages-style API client with connection pooling, token bucket rate
//! limiting, and exponential backoff retry for transient errors. The
//! model behind the endpoint is a black box; this adapter only moves
//! prompts and raw completions.

use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use crate::domain::models::config::LlmConfig;
use crate::domain::ports::llm_client::{CompletionRequest, LlmClient, LlmError};

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug)]
pub struct HttpLlmClient {
    http_client: ReqwestClient,
    config: LlmConfig,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(LlmError::NotConfigured("api_key is not set".to_string()));
        }

        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: TokenBucketRateLimiter::new(config.requests_per_second),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
            config,
        })
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = MessageRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or(""))
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }

        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|e| LlmError::NetworkError(format!("malformed response body: {e}")))?;

        let text: String = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(text)
    }
}

fn classify_status(status: StatusCode, message: String) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthError(message),
        s if s.is_server_error() => LlmError::ServerError {
            status: s.as_u16(),
            message,
        },
        _ => LlmError::InvalidRequest(message),
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn backend_id(&self) -> &str {
        "anthropic-api"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.rate_limiter.acquire().await;
        self.retry_policy
            .execute(|| self.send_request(&request))
            .await
    }
}
