//! Middleware primitives.
//!
//! A middleware receives the [`Context`] of one record and a [`Next`]
//! continuation. It can inspect the context, do some work, and then either
//! call [`Next::run`] to hand the context to the following entry, or return
//! without calling it to stop the chain there.
//!
//! Any async closure of the right shape is a middleware:
//!
//! ```rust,ignore
//! use ferrogram_framework::{Middleware, Next};
//!
//! let logger = |ctx: Arc<Context>, next: Next| async move {
//!     let started = Instant::now();
//!     next.run(ctx).await?;
//!     debug!(elapsed = ?started.elapsed(), "Update handled");
//!     Ok(())
//! };
//! ```
//!
//! `Next` is consumed by `run`, so an entry can continue the chain at most once.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use ferrogram_core::Context;

/// What a middleware returns. An error aborts the chain.
pub type MiddlewareResult = anyhow::Result<()>;

/// A single entry of a middleware chain.
pub trait Middleware: Send + Sync + 'static {
    /// Processes `ctx`, optionally continuing with `next`.
    fn call(&self, ctx: Arc<Context>, next: Next) -> BoxFuture<'static, MiddlewareResult>;
}

/// Type alias for a shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F, Fut> Middleware for F
where
    F: Fn(Arc<Context>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn call(&self, ctx: Arc<Context>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        Box::pin(self(ctx, next))
    }
}

// ============================================================================
// Next
// ============================================================================

/// The continuation handed to every middleware.
///
/// Running it invokes the remaining entries of the current chain and, once
/// they are exhausted, the continuation of the enclosing chain (if this chain
/// is mounted inside another one).
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    parent: Option<Box<Next>>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, parent: Option<Next>) -> Self {
        Self {
            chain,
            index: 0,
            parent: parent.map(Box::new),
        }
    }

    /// A continuation that does nothing.
    pub fn noop() -> Self {
        Self::new(Arc::from(Vec::new()), None)
    }

    /// Runs the rest of the chain with `ctx`.
    pub fn run(self, ctx: Arc<Context>) -> BoxFuture<'static, MiddlewareResult> {
        Box::pin(async move {
            match self.chain.get(self.index).cloned() {
                Some(entry) => {
                    let next = Next {
                        chain: self.chain,
                        index: self.index + 1,
                        parent: self.parent,
                    };
                    entry.call(ctx, next).await
                }
                None => match self.parent {
                    Some(parent) => (*parent).run(ctx).await,
                    None => Ok(()),
                },
            }
        })
    }

    /// Returns the number of entries left in the current chain.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining())
            .field("nested", &self.parent.is_some())
            .finish()
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Wraps a handler that ends the chain.
///
/// The returned middleware runs `f` and never calls `next`.
pub fn handler<F, Fut>(f: F) -> impl Middleware
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    move |ctx: Arc<Context>, _next: Next| f(ctx)
}

/// Wraps a side-effect that always continues the chain.
///
/// `f` runs first; if it succeeds the context is passed on.
pub fn tap<F, Fut>(f: F) -> impl Middleware
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    let f = Arc::new(f);
    move |ctx: Arc<Context>, next: Next| {
        let f = Arc::clone(&f);
        async move {
            f(Arc::clone(&ctx)).await?;
            next.run(ctx).await
        }
    }
}
