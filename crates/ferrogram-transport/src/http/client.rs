//! Bot API client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use ferrogram_core::{ApiError, ApiResult, HttpTransportConfig, Transport};

/// [`Transport`] implementation posting JSON to the Bot API.
///
/// Every call is a `POST {api_base_url}{token}/{method}` with the parameters
/// as JSON body. Calls carrying a `timeout` parameter (long polls) get that
/// many extra seconds on top of the configured request timeout.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Creates a transport from `config`.
    pub fn new(config: HttpTransportConfig) -> ApiResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Creates a transport for `token` with default settings.
    pub fn with_token(token: impl Into<String>) -> ApiResult<Self> {
        Self::new(HttpTransportConfig::new(token))
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        let url = self.config.method_url(method).ok_or(ApiError::MissingToken)?;

        let mut request = self.client.post(&url).json(&params);
        if let Some(poll) = params.get("timeout").and_then(Value::as_u64) {
            request = request.timeout(self.config.timeout + Duration::from_secs(poll));
        }

        trace!(method, "Calling Bot API");
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        let result = parse_envelope(status, &body);
        if let Err(err) = &result {
            debug!(method, status, error = %err, "Bot API call failed");
        }
        result
    }

    fn has_token(&self) -> bool {
        self.config.token.is_some()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_base_url", &self.config.api_base_url)
            .field("has_token", &self.config.token.is_some())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::transport(err.to_string())
    }
}

/// The response envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// Unwraps a response body into its `result`.
fn parse_envelope(status: u16, body: &[u8]) -> ApiResult<Value> {
    match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) if envelope.ok => Ok(envelope.result.unwrap_or(Value::Null)),
        Ok(envelope) => Err(ApiError::api(
            envelope.error_code.unwrap_or(i64::from(status)),
            envelope.description.unwrap_or_default(),
        )),
        Err(_) if !(200..300).contains(&status) => Err(ApiError::transport(format!(
            "HTTP {status} error: {}",
            String::from_utf8_lossy(body)
        ))),
        Err(err) => Err(ApiError::decode(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_envelope() {
        let body = br#"{"ok": true, "result": [{"update_id": 1}]}"#;
        assert_eq!(parse_envelope(200, body).unwrap(), json!([{ "update_id": 1 }]));
    }

    #[test]
    fn test_error_envelope() {
        let body = br#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let err = parse_envelope(401, body).unwrap_err();
        assert_eq!(err.code(), Some(401));
        assert_eq!(err.to_string(), "API error (401): Unauthorized");
    }

    #[test]
    fn test_non_json_error_status() {
        let err = parse_envelope(502, b"Bad Gateway").unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref msg) if msg.contains("502")));
    }

    #[test]
    fn test_non_json_success_status() {
        let err = parse_envelope(200, b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_call_without_token() {
        let transport = HttpTransport::new(HttpTransportConfig::default()).unwrap();
        assert!(!transport.has_token());
        let err = transport.call("getMe", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
    }
}
