//! The bot facade.
//!
//! A [`Bot`] ties one transport to one middleware chain and the two ways
//! records reach it: the [`Polling`] loop and the [`Webhook`] receiver.
//! Both feed the same [`Dispatcher`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, FerrogramConfig};
use crate::error::{PollingError, RuntimeResult};
use crate::polling::{PollerState, Polling, PollingOptions};
use crate::webhook::Webhook;
use ferrogram_core::{BoxedTransport, Context, Resolver, User};
use ferrogram_framework::{ChainResult, Dispatcher, KindSet, Middleware};

/// A bot: transport, middleware chain, and update sources.
pub struct Bot {
    config: FerrogramConfig,
    dispatcher: Arc<Dispatcher>,
    polling: Arc<Polling>,
    webhook: Webhook,
}

impl Bot {
    /// Creates a bot over `transport` with default settings.
    pub fn new(transport: BoxedTransport) -> Self {
        Self::with_config(transport, FerrogramConfig::default())
    }

    /// Creates a bot over `transport`.
    ///
    /// Only the polling, webhook and resolution settings of `config` are
    /// used; the transport is taken as given.
    pub fn with_config(transport: BoxedTransport, config: FerrogramConfig) -> Self {
        let resolver = Resolver::new(config.bot.resolution);
        let dispatcher = Arc::new(Dispatcher::new(transport).with_resolver(resolver));
        let polling = Arc::new(Polling::new(
            Arc::clone(&dispatcher),
            config.polling.clone(),
        ));
        let webhook = Webhook::new(Arc::clone(&dispatcher));

        Self {
            config,
            dispatcher,
            polling,
            webhook,
        }
    }

    /// Creates a bot with an HTTP transport built from `config`.
    #[cfg(feature = "http-client")]
    pub fn from_config(config: FerrogramConfig) -> RuntimeResult<Self> {
        let transport = ferrogram_transport::HttpTransport::new(config.bot.to_transport_config())?;
        Ok(Self::with_config(Arc::new(transport), config))
    }

    /// Creates a builder that loads configuration from files and environment.
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    pub fn config(&self) -> &FerrogramConfig {
        &self.config
    }

    pub fn transport(&self) -> &BoxedTransport {
        self.dispatcher.transport()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn polling(&self) -> &Arc<Polling> {
        &self.polling
    }

    pub fn webhook(&self) -> &Webhook {
        &self.webhook
    }

    // =========================================================================
    // Middleware registration
    // =========================================================================

    /// Appends an unconditional middleware.
    pub fn use_middleware(&self, middleware: impl Middleware) -> &Self {
        self.dispatcher.use_middleware(middleware);
        self
    }

    /// Appends a middleware that only sees the given kinds.
    pub fn on(&self, kinds: impl Into<KindSet>, middleware: impl Middleware) -> ChainResult<&Self> {
        self.dispatcher.on(kinds, middleware)?;
        Ok(self)
    }

    /// Installs the handler for errors escaping the chain.
    pub fn catch<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(Arc<Context>, anyhow::Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.catch(f);
        self
    }

    /// Resolves and dispatches one record, waiting for the chain to finish.
    pub async fn handle_update(&self, record: Value) -> Option<Arc<Context>> {
        self.dispatcher.handle_update(record).await
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Starts the polling loop. See [`Polling::start`].
    pub async fn start_polling(&self, options: PollingOptions) -> Result<(), PollingError> {
        self.polling.start(options).await
    }

    pub fn stop_polling(&self) {
        self.polling.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_running()
    }

    /// Returns the bot identity, once polling has fetched it.
    pub fn identity(&self) -> Option<&User> {
        self.polling.identity()
    }

    /// Polls until Ctrl+C or SIGTERM, or until polling gives up.
    pub async fn run_polling(&self, options: PollingOptions) -> RuntimeResult<()> {
        self.run_polling_until(options, wait_for_shutdown()).await
    }

    /// Polls until `shutdown` resolves, or until polling gives up.
    pub async fn run_polling_until<F>(&self, options: PollingOptions, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start_polling(options).await?;
        info!("Bot is polling for updates");

        tokio::select! {
            _ = shutdown => {}
            _ = wait_until_stopped(self.polling.subscribe()) => {
                if self.polling.gave_up() {
                    warn!("Polling stopped after exhausting its retries");
                } else {
                    info!("Polling stopped");
                }
            }
        }

        self.stop_polling();
        Ok(())
    }

    // =========================================================================
    // Webhook
    // =========================================================================

    /// Binds the webhook listener described by the configuration.
    #[cfg(feature = "http-server")]
    pub async fn listen_webhook(&self) -> RuntimeResult<ferrogram_transport::WebhookListener> {
        let server = self.config.webhook.to_server_config();
        let listener = ferrogram_transport::listen(&server, self.webhook.sink()).await?;
        Ok(listener)
    }

    /// Serves webhook deliveries until Ctrl+C or SIGTERM.
    #[cfg(feature = "http-server")]
    pub async fn run_webhook(&self) -> RuntimeResult<()> {
        self.run_webhook_until(wait_for_shutdown()).await
    }

    /// Serves webhook deliveries until `shutdown` resolves.
    #[cfg(feature = "http-server")]
    pub async fn run_webhook_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.listen_webhook().await?;
        info!(addr = %listener.local_addr(), "Bot is receiving updates by webhook");

        shutdown.await;

        listener.shutdown().await;
        Ok(())
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("dispatcher", &self.dispatcher)
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}

async fn wait_until_stopped(mut state: watch::Receiver<PollerState>) {
    let _ = state.wait_for(|state| *state == PollerState::Stopped).await;
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
            }
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// BotBuilder
// =============================================================================

/// Builder for creating a [`Bot`] from layered configuration.
///
/// # Example
///
/// ```rust,ignore
/// let bot = Bot::builder()
///     .config_file("ferrogram.toml")
///     .token(std::env::var("BOT_TOKEN")?)
///     .build()?;
/// ```
pub struct BotBuilder {
    config_loader: ConfigLoader,
    token: Option<String>,
}

impl BotBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            token: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the token, overriding every configuration source.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Loads the configuration without building a bot.
    pub fn load_config(self) -> ConfigResult<FerrogramConfig> {
        let mut config = self.config_loader.load()?;
        if let Some(token) = self.token {
            config.bot.token = Some(token);
        }
        Ok(config)
    }

    /// Builds a bot with an HTTP transport.
    #[cfg(feature = "http-client")]
    pub fn build(self) -> RuntimeResult<Bot> {
        Bot::from_config(self.load_config()?)
    }

    /// Builds a bot over a caller-provided transport.
    pub fn build_with_transport(self, transport: BoxedTransport) -> ConfigResult<Bot> {
        Ok(Bot::with_config(transport, self.load_config()?))
    }
}

impl Default for BotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryLimit;
    use async_trait::async_trait;
    use ferrogram_core::{ApiError, ApiResult, ResolutionStrategy, Transport, UpdateKind};
    use ferrogram_framework::handler;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct OfflineTransport;

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn call(&self, method: &str, _params: Value) -> ApiResult<Value> {
            match method {
                "getMe" => Ok(json!({ "id": 7, "is_bot": true, "first_name": "ferro" })),
                _ => Err(ApiError::Timeout),
            }
        }
    }

    #[tokio::test]
    async fn test_on_and_handle_update() {
        let bot = Bot::new(Arc::new(OfflineTransport));
        let counter = Arc::new(AtomicUsize::new(0));

        let seen = counter.clone();
        bot.on(
            UpdateKind::Message,
            handler(move |_ctx| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .unwrap();

        let ctx = bot
            .handle_update(json!({ "update_id": 5, "message": { "text": "hi" } }))
            .await
            .unwrap();
        assert_eq!(ctx.update_id(), 5);
        assert_eq!(ctx.kind(), UpdateKind::Message);

        bot.handle_update(json!({ "update_id": 6, "poll": {} })).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_config_uses_resolution_strategy() {
        let mut config = FerrogramConfig::default();
        config.bot.resolution = ResolutionStrategy::Strict;

        let bot = Bot::with_config(Arc::new(OfflineTransport), config);
        assert_eq!(
            bot.dispatcher().resolver().strategy(),
            ResolutionStrategy::Strict
        );

        let ctx = bot
            .handle_update(json!({ "message": { "text": "late id" }, "update_id": 9 }))
            .await
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::Message);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polling_returns_when_polling_gives_up() {
        let mut config = FerrogramConfig::default();
        config.polling.retry_limit = RetryLimit::Limited(1);

        let bot = Bot::with_config(Arc::new(OfflineTransport), config);
        bot.run_polling_until(PollingOptions::new(), std::future::pending())
            .await
            .unwrap();

        assert!(!bot.is_polling());
        assert!(bot.polling().gave_up());
        assert_eq!(bot.identity().map(|me| me.id), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polling_returns_when_stopped_elsewhere() {
        let bot = Bot::with_config(Arc::new(OfflineTransport), FerrogramConfig::default());

        let (ran, ()) = tokio::join!(
            bot.run_polling_until(PollingOptions::new(), std::future::pending()),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                bot.stop_polling();
            }
        );
        ran.unwrap();

        assert!(!bot.is_polling());
        assert!(!bot.polling().gave_up());
    }

    #[tokio::test]
    async fn test_run_polling_until_shutdown() {
        let bot = Bot::with_config(Arc::new(OfflineTransport), FerrogramConfig::default());
        bot.run_polling_until(PollingOptions::new(), async {}).await.unwrap();
        assert!(!bot.is_polling());
    }

    #[test]
    fn test_builder_token_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FERROGRAM_BOT__TOKEN", "from-env");

            let bot = Bot::builder()
                .token("explicit")
                .build_with_transport(Arc::new(OfflineTransport))
                .map_err(|e| e.to_string())?;

            assert_eq!(bot.config().bot.token.as_deref(), Some("explicit"));
            Ok(())
        });
    }
}
