//! Transport configuration types.
//!
//! These are the runtime-facing settings of the transports implemented in
//! `ferrogram-transport`. They are built from the user-facing configuration
//! schema in `ferrogram-runtime`.

use std::time::Duration;

/// Default Bot API base URL. The token and method name are appended to it.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org/bot";

/// Default timeout of a single API request.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Configuration for the HTTP API transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL, e.g. `https://api.telegram.org/bot`.
    pub api_base_url: String,
    /// Bot token, appended to the base URL.
    pub token: Option<String>,
    /// Request timeout.
    ///
    /// Long-poll calls add their own `timeout` on top of this.
    pub timeout: Duration,
    /// Route calls to the test environment (`/test/<method>`).
    pub test_environment: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_API_TIMEOUT,
            test_environment: false,
        }
    }
}

impl HttpTransportConfig {
    /// Creates a config for `token` with default settings.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Routes calls to the test environment.
    pub fn with_test_environment(mut self, enabled: bool) -> Self {
        self.test_environment = enabled;
        self
    }

    /// Builds the URL of `method`, or `None` without a token.
    pub fn method_url(&self, method: &str) -> Option<String> {
        let token = self.token.as_deref()?;
        let env = if self.test_environment { "test/" } else { "" };
        Some(format!("{}{token}/{env}{method}", self.api_base_url))
    }
}

/// Configuration for the webhook listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path the platform posts updates to.
    pub path: String,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            path: "/webhook".to_string(),
        }
    }
}

impl WebhookServerConfig {
    /// Returns the `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
