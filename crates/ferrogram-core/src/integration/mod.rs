//! Integration layer: how the core reaches the outside world.
//!
//! - [`transport`]: the [`Transport`] trait for outbound calls and typed helpers
//! - [`sink`]: the [`UpdateSink`] capability push transports feed records into
//! - [`config`]: settings of the concrete transports

pub mod config;
pub mod sink;
pub mod transport;

pub use config::{
    DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT, HttpTransportConfig, WebhookServerConfig,
};
pub use sink::{BoxedUpdateSink, UpdateSink};
pub use transport::{ApiExt, BoxedTransport, GetUpdatesParams, Transport};
