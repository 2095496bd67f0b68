//! # Ferrogram
//!
//! A middleware-driven Telegram Bot API client.
//!
//! ## Overview
//!
//! Ferrogram turns raw update records into typed contexts and runs them
//! through a chain of middleware. Records arrive either by long polling or by
//! webhook; both paths acknowledge before they dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Polling    │──┐
//! │ (getUpdates) │  │    ┌────────────┐    ┌──────────────┐    ┌─────────────────────┐
//! └──────────────┘  ├───▶│ Dispatcher │───▶│   Resolver   │───▶│  middleware chain   │──▶ Transport
//! ┌──────────────┐  │    │            │    │ (kind, id)   │    │ use / on / catch    │
//! │   Webhook    │──┘    └────────────┘    └──────────────┘    └─────────────────────┘
//! │ (axum POST)  │
//! └──────────────┘
//! ```
//!
//! - **Core**: update kinds, contexts, resolution, the `Transport` seam
//! - **Framework**: middleware, kind filters, composition, the dispatcher
//! - **Transport**: reqwest API client and axum webhook listener
//! - **Runtime**: polling, webhook receiver, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::builder().token(std::env::var("BOT_TOKEN")?).build()?;
//!     let _guard = logging::init_from_config(&bot.config().logging);
//!
//!     bot.on(UpdateKind::Message, handler(|ctx| async move {
//!         if let Some(text) = ctx.text() {
//!             ctx.call("sendMessage", json!({ "chat_id": ctx.chat_id(), "text": text })).await?;
//!         }
//!         Ok(())
//!     }))?;
//!
//!     bot.run_polling(PollingOptions::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-client` *(default)*: reqwest-based API transport
//! - `http-server` *(default)*: axum-based webhook listener

pub use ferrogram_core as core;
pub use ferrogram_framework as framework;
pub use ferrogram_runtime as runtime;
pub use ferrogram_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ferrogram::prelude::*;
/// ```
pub mod prelude {
    // Entry point
    pub use ferrogram_runtime::{Bot, FerrogramConfig, PollingOptions, RetryLimit, logging};

    // Middleware
    pub use ferrogram_framework::{Composer, Middleware, MiddlewareResult, Next, handler, on, tap};

    // Contexts
    pub use ferrogram_core::{ApiExt, Context, Targetable, Transport, UpdateKind};
}
