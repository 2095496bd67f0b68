//! # Ferrogram Framework
//!
//! The middleware chain of the ferrogram Bot API client.
//!
//! ## Overview
//!
//! - **Middleware**: the [`Middleware`] trait, the [`Next`] continuation and
//!   the [`handler`]/[`tap`] adapters
//! - **Filters**: [`KindFilter`] and [`KindSet`] gate entries on update kinds
//! - **Composition**: [`Composer`] builds immutable [`Composed`] chains that
//!   can be run or mounted inside other chains
//! - **Dispatch**: the [`Dispatcher`] resolves records and runs them through
//!   the current chain snapshot
//!
//! ## Flow
//!
//! ```text
//! record ──▶ Dispatcher::handle_update
//!               │ resolve
//!               ▼
//!            Context ──▶ [ use ] ──next──▶ [ on(message) ] ──next──▶ [ use ] ──▶ end
//!                            │                  │ kind mismatch: skip
//!                            └── no next: stop  └── Err: catch handler
//! ```

pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod middleware;

pub use composer::{CatchFn, Composed, Composer};
pub use dispatcher::Dispatcher;
pub use error::{ChainError, ChainResult};
pub use filter::{KindFilter, KindSet, on};
pub use middleware::{BoxedMiddleware, Middleware, MiddlewareResult, Next, handler, tap};
