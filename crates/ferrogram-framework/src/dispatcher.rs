//! Update dispatcher.
//!
//! The [`Dispatcher`] owns the middleware chain of a bot and is the single
//! entry point for records, whichever way they arrive:
//!
//! 1. The record is resolved into a [`Context`] (unsupported kinds are dropped)
//! 2. The current chain snapshot is taken
//! 3. The context runs through the snapshot inside a `dispatch` span
//!
//! Registration is allowed at any time, including while dispatches are in
//! flight. Every `use_middleware`/`on` call recomposes the chain at once and
//! swaps in a new snapshot; dispatches that already started keep the one
//! they took.
//!
//! ```rust,ignore
//! use ferrogram_framework::{Dispatcher, handler};
//!
//! let dispatcher = Dispatcher::new(transport);
//! dispatcher.on(UpdateKind::Message, handler(|ctx| async move {
//!     ctx.call("sendMessage", json!({ "chat_id": ctx.chat_id(), "text": "pong" })).await?;
//!     Ok(())
//! }))?;
//!
//! dispatcher.handle_update(record).await;
//! ```

use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{Instrument, debug_span, warn};

use crate::composer::{Composed, Composer};
use crate::error::ChainResult;
use crate::filter::KindSet;
use crate::middleware::Middleware;
use ferrogram_core::{BoxedTransport, Context, Resolver};

/// Resolves records and drives them through the middleware chain.
pub struct Dispatcher {
    transport: BoxedTransport,
    resolver: Resolver,
    composer: Mutex<Composer>,
    composed: RwLock<Arc<Composed>>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty chain.
    pub fn new(transport: BoxedTransport) -> Self {
        let composer = Composer::new();
        let composed = Arc::new(composer.compose());
        Self {
            transport,
            resolver: Resolver::default(),
            composer: Mutex::new(composer),
            composed: RwLock::new(composed),
        }
    }

    /// Sets the resolver used for incoming records.
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Returns the transport contexts are built with.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// Returns the resolver in use.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Appends an unconditional middleware.
    pub fn use_middleware(&self, middleware: impl Middleware) -> &Self {
        let mut composer = self.composer.lock();
        composer.use_middleware(middleware);
        self.recompose(&composer);
        self
    }

    /// Appends a middleware that only runs for the given kinds.
    pub fn on(
        &self,
        kinds: impl Into<KindSet>,
        middleware: impl Middleware,
    ) -> ChainResult<&Self> {
        let mut composer = self.composer.lock();
        composer.on(kinds, middleware)?;
        self.recompose(&composer);
        Ok(self)
    }

    /// Installs the terminal error handler of the chain.
    pub fn catch<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(Arc<Context>, anyhow::Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut composer = self.composer.lock();
        composer.catch(f);
        self.recompose(&composer);
        self
    }

    fn recompose(&self, composer: &Composer) {
        *self.composed.write() = Arc::new(composer.compose());
    }

    /// Returns the current chain snapshot.
    pub fn snapshot(&self) -> Arc<Composed> {
        Arc::clone(&self.composed.read())
    }

    /// Resolves `record` into a context without dispatching it.
    ///
    /// Malformed records are logged and dropped.
    pub fn resolve(&self, record: Value) -> Option<Context> {
        match self.resolver.resolve(&self.transport, record) {
            Ok(context) => context,
            Err(err) => {
                warn!(error = %err, "Dropping malformed update");
                None
            }
        }
    }

    /// Resolves `record` and runs it through the chain.
    ///
    /// Returns the dispatched context, or `None` if the record was dropped.
    /// Errors raised by middleware are handled by the chain's catch handler.
    pub async fn handle_update(&self, record: Value) -> Option<Arc<Context>> {
        let ctx = Arc::new(self.resolve(record)?);
        self.dispatch(Arc::clone(&ctx)).await;
        Some(ctx)
    }

    /// Runs an already built context through the current chain.
    pub async fn dispatch(&self, ctx: Arc<Context>) {
        let span = debug_span!("dispatch", update_id = ctx.update_id(), kind = %ctx.kind());
        let chain = self.snapshot();
        chain.run(ctx).instrument(span).await;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .field("entries", &self.composed.read().len())
            .finish_non_exhaustive()
    }
}
