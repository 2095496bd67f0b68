//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ferrogram_core::{
    DEFAULT_API_BASE_URL, HttpTransportConfig, ResolutionStrategy, UpdateKind,
    WebhookServerConfig,
};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FerrogramConfig {
    /// Bot credentials and API access.
    #[serde(default)]
    pub bot: BotConfig,

    /// Long-polling settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Webhook listener settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot credentials and API access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by the platform.
    #[serde(default)]
    pub token: Option<String>,

    /// Base URL the token and method are appended to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout of a single API request in milliseconds.
    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,

    /// Route calls to the test environment.
    #[serde(default)]
    pub test_environment: bool,

    /// How update records are mapped to kinds.
    #[serde(default)]
    pub resolution: ResolutionStrategy,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: default_api_base_url(),
            api_timeout_ms: default_api_timeout_ms(),
            test_environment: false,
            resolution: ResolutionStrategy::default(),
        }
    }
}

impl BotConfig {
    /// Converts to the HTTP transport settings.
    pub fn to_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            api_base_url: self.api_base_url.clone(),
            token: self.token.clone(),
            timeout: Duration::from_millis(self.api_timeout_ms),
            test_environment: self.test_environment,
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_timeout_ms() -> u64 {
    30_000
}

// =============================================================================
// Polling
// =============================================================================

/// How many times a failed fetch is retried before polling gives up.
///
/// Serialized as an integer: `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RetryLimit {
    /// Retry forever.
    Unlimited,
    /// Retry at most this many times in a row. `0` never retries.
    Limited(u32),
}

impl Default for RetryLimit {
    fn default() -> Self {
        Self::Limited(3)
    }
}

impl TryFrom<i64> for RetryLimit {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unlimited),
            n => u32::try_from(n)
                .map(Self::Limited)
                .map_err(|_| format!("retry limit must be -1 or a non-negative integer, got {n}")),
        }
    }
}

impl From<RetryLimit> for i64 {
    fn from(limit: RetryLimit) -> Self {
        match limit {
            RetryLimit::Unlimited => -1,
            RetryLimit::Limited(n) => i64::from(n),
        }
    }
}

impl fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,

    /// Kinds the server should deliver. Empty means the server default.
    #[serde(default)]
    pub allowed_updates: Vec<UpdateKind>,

    /// Retry ceiling after failed fetches.
    #[serde(default)]
    pub retry_limit: RetryLimit,

    /// Fixed delay between a failed fetch and the next attempt, in milliseconds.
    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,

    /// Upper bound on concurrently dispatched records. Unbounded when unset.
    #[serde(default)]
    pub max_in_flight: Option<NonZeroUsize>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout_secs(),
            allowed_updates: Vec::new(),
            retry_limit: RetryLimit::default(),
            retry_wait_ms: default_retry_wait_ms(),
            max_in_flight: None,
        }
    }
}

impl PollingConfig {
    /// Returns the delay between retries.
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }
}

fn default_poll_timeout_secs() -> u64 {
    15
}

fn default_retry_wait_ms() -> u64 {
    3_000
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Host address to bind to.
    #[serde(default = "default_webhook_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Path the platform posts updates to.
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
            path: default_webhook_path(),
        }
    }
}

impl WebhookConfig {
    /// Converts to the listener settings.
    pub fn to_server_config(&self) -> WebhookServerConfig {
        WebhookServerConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
        }
    }
}

fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    8443
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Hourly,
    #[default]
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used with `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `ferrogram_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Daily,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_limit_serde() {
        let limit: RetryLimit = serde_json::from_value(json!(-1)).unwrap();
        assert_eq!(limit, RetryLimit::Unlimited);

        let limit: RetryLimit = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(limit, RetryLimit::Limited(0));

        assert!(serde_json::from_value::<RetryLimit>(json!(-2)).is_err());
        assert_eq!(serde_json::to_value(RetryLimit::Limited(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_defaults() {
        let config = FerrogramConfig::default();
        assert_eq!(config.polling.timeout_secs, 15);
        assert_eq!(config.polling.retry_limit, RetryLimit::Limited(3));
        assert_eq!(config.polling.retry_wait(), Duration::from_secs(3));
        assert_eq!(config.bot.api_base_url, "https://api.telegram.org/bot");

        let transport = config.bot.to_transport_config();
        assert_eq!(transport.timeout, Duration::from_secs(30));
        assert!(transport.token.is_none());
    }

    #[test]
    fn test_partial_document() {
        let config: FerrogramConfig = serde_json::from_value(json!({
            "bot": { "token": "1:x", "resolution": "strict" },
            "polling": { "allowed_updates": ["message", "callback_query"], "retry_limit": -1 },
            "logging": { "level": "debug", "filters": { "hyper": "warn" } }
        }))
        .unwrap();

        assert_eq!(config.bot.resolution, ResolutionStrategy::Strict);
        assert_eq!(
            config.polling.allowed_updates,
            vec![UpdateKind::Message, UpdateKind::CallbackQuery]
        );
        assert_eq!(config.polling.retry_limit, RetryLimit::Unlimited);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["hyper"], LogLevel::Warn);
        assert_eq!(config.webhook.path, "/webhook");
    }

    #[test]
    fn test_max_in_flight_must_be_positive() {
        let config: PollingConfig = serde_json::from_value(json!({ "max_in_flight": 4 })).unwrap();
        assert_eq!(config.max_in_flight, NonZeroUsize::new(4));

        assert!(serde_json::from_value::<PollingConfig>(json!({ "max_in_flight": 0 })).is_err());
    }
}
