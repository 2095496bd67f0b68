//! Dispatch context.
//!
//! A [`Context`] is built once per dispatched record by the
//! [`ContextFactory`](crate::ContextFactory) and handed to every middleware in
//! the chain as `Arc<Context>`. It is read-only: it carries the resolved kind,
//! the payload, the originating record and a handle to the transport for any
//! outbound calls a handler makes.
//!
//! Sender and chat information is extracted once at construction into a
//! [`TargetInfo`] and exposed through the [`Targetable`] trait:
//!
//! ```rust,ignore
//! use ferrogram_core::{Context, Targetable};
//!
//! fn describe(ctx: &Context) -> String {
//!     match (ctx.sender_id(), ctx.chat_id()) {
//!         (Some(user), Some(chat)) if ctx.is_pm() => format!("{user} in private"),
//!         (Some(user), Some(chat)) => format!("{user} in {chat}"),
//!         _ => "anonymous".into(),
//!     }
//! }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::foundation::error::ApiResult;
use crate::foundation::kind::UpdateKind;
use crate::foundation::model::{Chat, ChatType, Message, User};
use crate::integration::transport::BoxedTransport;

// =============================================================================
// TargetInfo
// =============================================================================

/// Who sent an update and where it happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetInfo {
    /// The user behind the update.
    pub sender: Option<User>,
    /// The chat that sent the update on behalf of a user (anonymous admins, channels).
    pub sender_chat: Option<Chat>,
    /// The chat the update belongs to.
    pub chat: Option<Chat>,
}

impl TargetInfo {
    /// Extracts the target of a payload of the given kind.
    pub fn extract(kind: UpdateKind, payload: &Value) -> Self {
        use UpdateKind as K;

        match kind {
            K::Message
            | K::EditedMessage
            | K::ChannelPost
            | K::EditedChannelPost
            | K::NewChatMembers
            | K::LeftChatMember
            | K::NewChatTitle
            | K::NewChatPhoto
            | K::DeleteChatPhoto
            | K::GroupChatCreated
            | K::SupergroupChatCreated
            | K::ChannelChatCreated
            | K::MigrateToChatId
            | K::MigrateFromChatId
            | K::PinnedMessage
            | K::Invoice
            | K::SuccessfulPayment
            | K::MessageAutoDeleteTimerChanged
            | K::VideoChatScheduled
            | K::VideoChatStarted
            | K::VideoChatEnded
            | K::VideoChatParticipantsInvited
            | K::WebAppData => Self {
                sender: field(payload, "from"),
                sender_chat: field(payload, "sender_chat"),
                chat: field(payload, "chat"),
            },
            K::CallbackQuery => Self {
                sender: field(payload, "from"),
                sender_chat: None,
                chat: payload.get("message").and_then(|m| field(m, "chat")),
            },
            K::InlineQuery | K::ChosenInlineResult | K::ShippingQuery | K::PreCheckoutQuery => {
                Self {
                    sender: field(payload, "from"),
                    ..Self::default()
                }
            }
            K::PollAnswer => Self {
                sender: field(payload, "user"),
                sender_chat: field(payload, "voter_chat"),
                chat: None,
            },
            K::MyChatMember | K::ChatMember | K::ChatJoinRequest => Self {
                sender: field(payload, "from"),
                sender_chat: None,
                chat: field(payload, "chat"),
            },
            K::Poll => Self::default(),
        }
    }
}

fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    payload
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// Shared sender/chat accessors for anything that carries a [`TargetInfo`].
pub trait Targetable {
    /// Returns the extracted target.
    fn target(&self) -> &TargetInfo;

    /// Returns the sending user.
    fn sender(&self) -> Option<&User> {
        self.target().sender.as_ref()
    }

    /// Returns the chat the update belongs to.
    fn chat(&self) -> Option<&Chat> {
        self.target().chat.as_ref()
    }

    /// Returns the chat that sent the update on behalf of a user.
    fn sender_chat(&self) -> Option<&Chat> {
        self.target().sender_chat.as_ref()
    }

    /// Returns the sender's id, falling back to the sender chat's id.
    fn sender_id(&self) -> Option<i64> {
        self.sender()
            .map(|user| user.id)
            .or_else(|| self.sender_chat().map(|chat| chat.id))
    }

    fn chat_id(&self) -> Option<i64> {
        self.chat().map(|chat| chat.id)
    }

    fn chat_type(&self) -> Option<ChatType> {
        self.chat().map(|chat| chat.kind)
    }

    /// Returns `true` for private chats.
    fn is_pm(&self) -> bool {
        self.chat_type() == Some(ChatType::Private)
    }

    fn is_group(&self) -> bool {
        self.chat_type() == Some(ChatType::Group)
    }

    fn is_supergroup(&self) -> bool {
        self.chat_type() == Some(ChatType::Supergroup)
    }

    fn is_channel(&self) -> bool {
        self.chat_type() == Some(ChatType::Channel)
    }
}

// =============================================================================
// Context
// =============================================================================

/// The normalized wrapper around one record handed to the middleware chain.
pub struct Context {
    transport: BoxedTransport,
    update: Arc<Value>,
    payload: Value,
    kind: UpdateKind,
    update_id: i64,
    origin: Option<UpdateKind>,
    target: TargetInfo,
}

impl Context {
    /// Creates a context for a resolved record.
    pub fn new(
        transport: BoxedTransport,
        update: Arc<Value>,
        kind: UpdateKind,
        payload: Value,
        update_id: i64,
    ) -> Self {
        let target = TargetInfo::extract(kind, &payload);
        Self {
            transport,
            update,
            payload,
            kind,
            update_id,
            origin: None,
            target,
        }
    }

    /// Marks this context as resolved from a record of kind `origin`.
    pub(crate) fn with_origin(mut self, origin: UpdateKind) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Returns the resolved kind.
    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    /// Returns the identifier of the originating record.
    pub fn update_id(&self) -> i64 {
        self.update_id
    }

    /// Returns the payload this context was built from.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the full originating record.
    pub fn update(&self) -> &Value {
        &self.update
    }

    /// Returns the kind of the record this service event was found in.
    pub fn origin_kind(&self) -> Option<UpdateKind> {
        self.origin
    }

    /// Returns `true` if this context was resolved from a `message` payload
    /// into a more specific service event.
    pub fn is_service_event(&self) -> bool {
        self.origin.is_some()
    }

    /// Returns `true` if the kind of this context is one of `kinds`.
    pub fn is(&self, kinds: &[UpdateKind]) -> bool {
        kinds.contains(&self.kind)
    }

    /// Deserializes the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }

    /// Returns the payload as a [`Message`] for kinds that carry one.
    pub fn message(&self) -> Option<Message> {
        if self.kind.carries_message() {
            self.payload_as().ok()
        } else {
            None
        }
    }

    /// Returns the message text, or the caption of a media message.
    pub fn text(&self) -> Option<&str> {
        if !self.kind.carries_message() {
            return None;
        }
        self.payload
            .get("text")
            .or_else(|| self.payload.get("caption"))
            .and_then(Value::as_str)
    }

    /// Returns the transport for outbound calls.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// Performs a remote call through the transport.
    pub async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.transport.call(method, params).await
    }
}

impl Targetable for Context {
    fn target(&self) -> &TargetInfo {
        &self.target
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("update_id", &self.update_id)
            .field("origin", &self.origin)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
