use serde::{Deserialize, Serialize};

/// Which solving strategy the coordinator uses.
///
/// Selected once at configuration load and threaded into the coordinator
/// constructor; never re-read from ambient state per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyMode {
    Rules,
    Llm,
    Agentic,
}

impl Default for StrategyMode {
    fn default() -> Self {
        Self::Rules
    }
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rules => "RULES",
            Self::Llm => "LLM",
            Self::Agentic => "AGENTIC",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RULES" => Some(Self::Rules),
            "LLM" => Some(Self::Llm),
            "AGENTIC" => Some(Self::Agentic),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main configuration structure for Chronos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Solving strategy mode
    #[serde(default)]
    pub mode: StrategyMode,

    /// Coordinator policy
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Agentic merge policy
    #[serde(default)]
    pub merge: MergeConfig,

    /// Verification engine policy
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Event bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// LLM backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordinator policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Allow `proposed -> deploy_requested` for low-risk, no-approval fixes
    #[serde(default = "default_true")]
    pub auto_deploy_low_risk: bool,

    /// Identity recorded in `proposed_by`
    #[serde(default = "default_proposed_by")]
    pub proposed_by: String,

    /// Seconds after `verified` before a fix is promoted to `stable`
    #[serde(default = "default_stable_after_secs")]
    pub stable_after_secs: u64,
}

const fn default_true() -> bool {
    true
}

fn default_proposed_by() -> String {
    "fix-coordinator".to_string()
}

const fn default_stable_after_secs() -> u64 {
    300
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            auto_deploy_low_risk: default_true(),
            proposed_by: default_proposed_by(),
            stable_after_secs: default_stable_after_secs(),
        }
    }
}

/// Agentic merge window. Policy, not a hardcoded constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MergeConfig {
    /// Seconds to wait for partial solutions before merging what arrived
    #[serde(default = "default_merge_window_secs")]
    pub window_secs: u64,
}

const fn default_merge_window_secs() -> u64 {
    10
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            window_secs: default_merge_window_secs(),
        }
    }
}

/// Verification engine policy. Cadence is configurable, not hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VerificationConfig {
    /// Milliseconds between telemetry samples for each action loop
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Default verification window for actions without an explicit one
    #[serde(default = "default_window_seconds")]
    pub default_window_seconds: u64,
}

const fn default_sample_interval_ms() -> u64 {
    1000
}

const fn default_window_seconds() -> u64 {
    300
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            default_window_seconds: default_window_seconds(),
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BusConfig {
    /// Capacity of the broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Retain events in the in-memory store for audit/replay
    #[serde(default = "default_true")]
    pub persist_events: bool,
}

const fn default_channel_capacity() -> usize {
    1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            persist_events: default_true(),
        }
    }
}

/// LLM backend configuration (the model itself is a black box behind a
/// strict JSON contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key; typically injected via `CHRONOS_LLM__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per second allowed against the backend
    #[serde(default = "default_llm_rps")]
    pub requests_per_second: f64,

    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_llm_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_llm_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    2000
}

const fn default_llm_temperature() -> f32 {
    0.3
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

const fn default_llm_rps() -> f64 {
    5.0
}

const fn default_llm_max_retries() -> u32 {
    3
}

const fn default_llm_initial_backoff_ms() -> u64 {
    1000
}

const fn default_llm_max_backoff_ms() -> u64 {
    30_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            requests_per_second: default_llm_rps(),
            max_retries: default_llm_max_retries(),
            initial_backoff_ms: default_llm_initial_backoff_ms(),
            max_backoff_ms: default_llm_max_backoff_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
