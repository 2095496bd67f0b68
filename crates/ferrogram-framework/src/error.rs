//! Error types for the middleware chain.
//!
//! Errors raised *by* middleware are plain [`anyhow::Error`]s; this module
//! covers mistakes made while *building* a chain.

use thiserror::Error;

/// Errors that can occur while registering middleware.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// `on` was called with an empty set of kinds.
    #[error("kind filter must name at least one update kind")]
    EmptyKinds,

    /// A kind tag given as text names no known kind.
    #[error("unknown update kind: {0}")]
    UnknownKind(String),
}

/// Result type for chain building operations.
pub type ChainResult<T> = Result<T, ChainError>;
