//! # Ferrogram Runtime
//!
//! Update sources and application wiring for ferrogram bots.
//!
//! This crate provides:
//! - [`Polling`]: the long-polling loop with its retry/backoff state machine
//! - [`Webhook`]: the push receiver that acknowledges before dispatching
//! - [`Bot`]: one transport, one middleware chain, both update sources
//! - Layered configuration ([`config`]) and logging setup ([`logging`])
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrogram_runtime::{Bot, PollingOptions, logging};
//! use ferrogram_framework::handler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::builder().build()?;
//!     let _guard = logging::init_from_config(&bot.config().logging);
//!
//!     bot.on(UpdateKind::Message, handler(|ctx| async move {
//!         ctx.call("sendMessage", json!({ "chat_id": ctx.chat_id(), "text": "pong" })).await?;
//!         Ok(())
//!     }))?;
//!
//!     bot.run_polling(PollingOptions::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-client` *(default)*: [`Bot::from_config`] with the reqwest transport
//! - `http-server` *(default)*: [`Bot::listen_webhook`] with the axum listener

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod polling;
pub mod webhook;

pub use bot::{Bot, BotBuilder, wait_for_shutdown};
pub use config::{ConfigError, ConfigLoader, ConfigResult, FerrogramConfig, RetryLimit};
pub use error::{PollingError, RuntimeError, RuntimeResult, WebhookError};
pub use logging::{LogGuard, LoggingBuilder, SpanEvents};
pub use polling::{PollerState, Polling, PollingOptions};
pub use webhook::{Webhook, WebhookAck};
