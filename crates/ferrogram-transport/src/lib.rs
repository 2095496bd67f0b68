//! # Ferrogram Transport
//!
//! Network implementations of the seams defined in `ferrogram-core`.
//!
//! ## Features
//!
//! - `http-client`: [`HttpTransport`], a reqwest-based [`Transport`]
//! - `http-server`: an axum webhook listener feeding an [`UpdateSink`]
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  ferrogram-runtime   │  (polling, webhook receiver)
//! ├──────────────────────┤
//! │  ferrogram-core      │  (Transport, UpdateSink)
//! ├──────────────────────┤
//! │  ferrogram-transport │  <- This crate (implementations)
//! ├──────────────────────┤
//! │  Network (HTTP)      │
//! └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram_core::{ApiExt, HttpTransportConfig};
//! use ferrogram_transport::HttpTransport;
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new(token))?;
//! let me = transport.get_me().await?;
//! ```
//!
//! [`Transport`]: ferrogram_core::Transport
//! [`UpdateSink`]: ferrogram_core::UpdateSink

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::HttpTransport;

#[cfg(feature = "http-server")]
pub use http::{WebhookListener, listen, webhook_router};
