//! Chain composition.
//!
//! A [`Composer`] collects middleware in registration order. Calling
//! [`Composer::compose`] freezes the current entries into a [`Composed`]
//! chain: an immutable snapshot that can be run, shared between tasks, or
//! mounted inside another chain as a single entry.
//!
//! ```rust,ignore
//! use ferrogram_framework::{Composer, handler};
//!
//! let mut admin = Composer::new();
//! admin.use_middleware(require_admin);
//! admin.on(UpdateKind::Message, handler(ban_command))?;
//!
//! let mut root = Composer::new();
//! root.use_middleware(log_updates)
//!     .use_middleware(admin.compose())
//!     .catch(|ctx, err| async move { report(ctx, err).await });
//!
//! root.compose().run(ctx).await;
//! ```
//!
//! # Errors
//!
//! An error returned by an entry aborts the rest of the chain. The root chain
//! hands it to its catch handler, which by default logs it. A mounted chain
//! with its own catch handler stops the error there; without one the error
//! travels up to the enclosing chain.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::error;

use crate::error::ChainResult;
use crate::filter::{KindFilter, KindSet};
use crate::middleware::{BoxedMiddleware, Middleware, MiddlewareResult, Next};
use ferrogram_core::Context;

/// Terminal error handler of a chain.
pub type CatchFn =
    Arc<dyn Fn(Arc<Context>, anyhow::Error) -> BoxFuture<'static, ()> + Send + Sync>;

// ============================================================================
// Composer
// ============================================================================

/// Builder collecting middleware in registration order.
#[derive(Clone, Default)]
pub struct Composer {
    entries: Vec<BoxedMiddleware>,
    catch: Option<CatchFn>,
}

impl Composer {
    /// Creates an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an unconditional middleware.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.entries.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    pub fn push(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.entries.push(middleware);
        self
    }

    /// Appends a middleware that only runs for the given kinds.
    pub fn on(
        &mut self,
        kinds: impl Into<KindSet>,
        middleware: impl Middleware,
    ) -> ChainResult<&mut Self> {
        let filter = KindFilter::new(kinds, middleware)?;
        Ok(self.use_middleware(filter))
    }

    /// Installs the terminal error handler.
    pub fn catch<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<Context>, anyhow::Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.catch = Some(Arc::new(
            move |ctx: Arc<Context>, err: anyhow::Error| -> BoxFuture<'static, ()> {
                Box::pin(f(ctx, err))
            },
        ));
        self
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the current entries into a runnable chain.
    pub fn compose(&self) -> Composed {
        Composed {
            entries: Arc::from(self.entries.as_slice()),
            catch: self.catch.clone(),
        }
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("entries", &self.entries.len())
            .field("catch", &self.catch.is_some())
            .finish()
    }
}

// ============================================================================
// Composed
// ============================================================================

/// An immutable, runnable chain.
#[derive(Clone)]
pub struct Composed {
    entries: Arc<[BoxedMiddleware]>,
    catch: Option<CatchFn>,
}

impl Composed {
    /// Runs the chain as the root of a dispatch.
    ///
    /// Errors never escape: they go to the catch handler, or are logged.
    pub async fn run(&self, ctx: Arc<Context>) {
        let next = Next::new(Arc::clone(&self.entries), None);
        if let Err(err) = next.run(Arc::clone(&ctx)).await {
            match &self.catch {
                Some(catch) => catch(ctx, err).await,
                None => log_unhandled(&ctx, &err),
            }
        }
    }

    /// Returns the number of entries in this chain.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Middleware for Composed {
    fn call(&self, ctx: Arc<Context>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        let entries = Arc::clone(&self.entries);
        let catch = self.catch.clone();
        Box::pin(async move {
            let result = Next::new(entries, Some(next)).run(Arc::clone(&ctx)).await;
            match (result, catch) {
                (Err(err), Some(catch)) => {
                    catch(ctx, err).await;
                    Ok(())
                }
                (result, _) => result,
            }
        })
    }
}

impl std::fmt::Debug for Composed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composed")
            .field("entries", &self.entries.len())
            .field("catch", &self.catch.is_some())
            .finish()
    }
}

fn log_unhandled(ctx: &Context, err: &anyhow::Error) {
    error!(
        update_id = ctx.update_id(),
        kind = %ctx.kind(),
        "Unhandled error in middleware chain: {err:#}"
    );
}
