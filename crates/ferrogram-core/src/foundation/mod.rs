//! Foundation layer: the update model.
//!
//! - [`kind`]: the closed set of update kinds and the service-event table
//! - [`model`]: partial payload models
//! - [`context`]: the per-record [`Context`] and its target accessors
//! - [`resolver`]: raw record to context resolution
//! - [`error`]: shared error types

pub mod context;
pub mod error;
pub mod kind;
pub mod model;
pub mod resolver;

pub use context::{Context, TargetInfo, Targetable};
pub use error::{ApiError, ApiResult, ResolveError, ResolveResult};
pub use kind::{SERVICE_EVENTS, UnknownKind, UpdateKind};
pub use model::{
    CallbackQuery, Chat, ChatMemberUpdated, ChatType, InlineQuery, Message, PreCheckoutQuery, User,
};
pub use resolver::{ContextFactory, ResolutionStrategy, Resolver, UPDATE_ID, service_event};
