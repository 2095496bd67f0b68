//! Runtime error types.

use ferrogram_core::ApiError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by [`Polling::start`](crate::Polling::start).
#[derive(Error, Debug)]
pub enum PollingError {
    /// `start` was called while polling was not stopped.
    #[error("Polling is already started")]
    AlreadyRunning,

    /// The transport has no credential token.
    #[error("Token is not set")]
    MissingToken,

    /// The one-time identity fetch failed.
    #[error("Unable to fetch bot identity: {0}")]
    Identity(#[source] ApiError),
}

/// Errors reported by the webhook receiver to its caller.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// The request carried no body and none was pre-parsed.
    #[error("Webhook request has no body")]
    MissingBody,

    /// The raw body is not valid JSON.
    #[error("Webhook body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Polling(#[from] PollingError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// Building the transport or calling the API failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Binding or serving the webhook listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A global logging subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
