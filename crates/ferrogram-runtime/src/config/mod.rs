//! Configuration for the ferrogram runtime.
//!
//! Settings are layered with figment: built-in defaults, then a
//! `ferrogram.toml` / `ferrogram.yaml` file, then `FERROGRAM_*` environment
//! variables. See [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, FerrogramConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    PollingConfig, RetryLimit, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;
