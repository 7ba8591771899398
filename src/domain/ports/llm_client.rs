//! LLM client port.
//!
//! The concrete model is a black box behind this trait: the strategy hands
//! it a bounded prompt and demands strict JSON back. Which backend answers
//! (hosted API, local model, test double) is an adapter concern.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from an LLM backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM not configured: {0}")]
    NotConfigured(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// Transient errors are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded
                | Self::Timeout(_)
                | Self::NetworkError(_)
                | Self::ServerError { .. }
        )
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Port trait for LLM backends.
///
/// Implementations must be `Send + Sync` for concurrent use across tasks.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Identifier recorded in solution provenance (e.g. "anthropic-api").
    fn backend_id(&self) -> &str;

    /// Run one completion and return the raw text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
