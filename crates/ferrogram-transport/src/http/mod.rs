//! HTTP transports.
//!
//! - `http-client`: [`HttpTransport`], the Bot API client
//! - `http-server`: the webhook listener

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::HttpTransport;

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{WebhookListener, listen, webhook_router};
