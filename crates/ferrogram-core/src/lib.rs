//! # Ferrogram Core
//!
//! The update model of the ferrogram Bot API client.
//!
//! This crate knows what an update record is and how to turn one into a
//! dispatchable [`Context`]. It does not know how records are fetched or how
//! handlers are chained; those live in `ferrogram-runtime` and
//! `ferrogram-framework`.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Kinds**: the closed [`UpdateKind`] enum and the [`SERVICE_EVENTS`] table
//! - **Context**: the read-only [`Context`] and the [`Targetable`] accessors
//! - **Resolution**: [`Resolver`] and [`ContextFactory`]
//!
//! ### Integration Layer
//!
//! - **Transport**: the [`Transport`] seam for outbound calls, plus [`ApiExt`]
//! - **Push delivery**: the [`UpdateSink`] capability used by webhook servers
//!
//! ## Data Flow
//!
//! ```text
//! raw record ──▶ Resolver ──▶ ContextFactory ──▶ Context ──▶ middleware chain
//!                   │                               │
//!                   └── service-event pass ─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferrogram_core::{Resolver, UpdateKind};
//!
//! let record = serde_json::from_str(r#"{"update_id": 5, "message": {"text": "hi"}}"#)?;
//! let ctx = Resolver::default().resolve(&transport, record)?.expect("supported kind");
//!
//! assert_eq!(ctx.kind(), UpdateKind::Message);
//! assert_eq!(ctx.update_id(), 5);
//! ```

pub mod foundation;
pub mod integration;

pub use foundation::{
    ApiError, ApiResult, CallbackQuery, Chat, ChatMemberUpdated, ChatType, Context,
    ContextFactory, InlineQuery, Message, PreCheckoutQuery, ResolutionStrategy, ResolveError,
    ResolveResult, Resolver, SERVICE_EVENTS, TargetInfo, Targetable, UPDATE_ID, UnknownKind,
    UpdateKind, User, service_event,
};

pub use integration::{
    ApiExt, BoxedTransport, BoxedUpdateSink, DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT,
    GetUpdatesParams, HttpTransportConfig, Transport, UpdateSink, WebhookServerConfig,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::{Context, Targetable, UpdateKind};
    pub use super::integration::{ApiExt, BoxedTransport, Transport};
}
