//! LLM backend adapters.

pub mod http;
pub mod rate_limiter;
pub mod retry;

pub use http::HttpLlmClient;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
