//! Unified error types for the ferrogram core.
//!
//! This module provides the error types shared by every layer above the core:
//! failures of remote calls ([`ApiError`]) and failures to turn a raw record
//! into a context ([`ResolveError`]). Chain-level errors live in
//! `ferrogram-framework`.

use serde_json::Value;
use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Errors returned by a [`Transport`](crate::Transport) call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote API answered with `ok: false`.
    #[error("API error ({code}): {description}")]
    Api {
        /// The `error_code` field of the response envelope.
        code: i64,
        /// The `description` field of the response envelope.
        description: String,
    },

    /// The request never produced a usable response (network, TLS, status).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("API call timed out")]
    Timeout,

    /// The response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// No credential token is configured for this transport.
    #[error("no bot token configured")]
    MissingToken,
}

impl ApiError {
    /// Creates an API error from the response envelope fields.
    pub fn api(code: i64, description: impl Into<String>) -> Self {
        Self::Api {
            code,
            description: description.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Returns the remote error code, if this error came from the API itself.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Resolve Errors
// =============================================================================

/// Errors raised while resolving a raw record into a context.
///
/// An unsupported kind tag is not an error: the resolver returns `Ok(None)`
/// for it.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The record is not a JSON object.
    #[error("update record is not an object: {0}")]
    NotAnObject(String),

    /// The record lacks a usable `update_id`.
    #[error("update record has no integer update_id")]
    MissingId,

    /// The record has no field after the identifier.
    #[error("update {update_id} carries no kind field")]
    MissingKind {
        /// The identifier of the offending record.
        update_id: i64,
    },

    /// Strict resolution found more than one known kind field.
    #[error("update {update_id} carries several kind fields: {kinds:?}")]
    Ambiguous {
        /// The identifier of the offending record.
        update_id: i64,
        /// Every known kind field found in the record.
        kinds: Vec<String>,
    },
}

impl ResolveError {
    pub(crate) fn not_an_object(value: &Value) -> Self {
        let shape = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        Self::NotAnObject(shape.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for record resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;
