//! Update kind tags.
//!
//! Every record delivered by the Bot API carries exactly one field naming
//! what it is (`message`, `callback_query`, ...). [`UpdateKind`] is the closed
//! set of tags this crate knows how to turn into a [`Context`].
//!
//! Some kinds never appear as a top-level field in practice. They are the
//! *service events*: a `message` whose payload carries, for example,
//! `new_chat_members` is dispatched as [`UpdateKind::NewChatMembers`]. The
//! order of [`SERVICE_EVENTS`] decides which one wins when a payload carries
//! several of these fields.
//!
//! [`Context`]: crate::Context

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A kind tag identifying the shape of an update record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    InlineQuery,
    ChosenInlineResult,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,

    // Service events, resolved from the payload of a `message`.
    NewChatMembers,
    LeftChatMember,
    NewChatTitle,
    NewChatPhoto,
    DeleteChatPhoto,
    GroupChatCreated,
    SupergroupChatCreated,
    ChannelChatCreated,
    MigrateToChatId,
    MigrateFromChatId,
    PinnedMessage,
    Invoice,
    SuccessfulPayment,
    MessageAutoDeleteTimerChanged,
    VideoChatScheduled,
    VideoChatStarted,
    VideoChatEnded,
    VideoChatParticipantsInvited,
    WebAppData,
}

/// Service events in precedence order. The first field present in a
/// `message` payload decides the kind the message is dispatched as.
pub const SERVICE_EVENTS: &[UpdateKind] = &[
    UpdateKind::NewChatMembers,
    UpdateKind::LeftChatMember,
    UpdateKind::NewChatTitle,
    UpdateKind::NewChatPhoto,
    UpdateKind::DeleteChatPhoto,
    UpdateKind::GroupChatCreated,
    UpdateKind::SupergroupChatCreated,
    UpdateKind::ChannelChatCreated,
    UpdateKind::MigrateToChatId,
    UpdateKind::MigrateFromChatId,
    UpdateKind::PinnedMessage,
    UpdateKind::Invoice,
    UpdateKind::SuccessfulPayment,
    UpdateKind::MessageAutoDeleteTimerChanged,
    UpdateKind::VideoChatScheduled,
    UpdateKind::VideoChatStarted,
    UpdateKind::VideoChatEnded,
    UpdateKind::VideoChatParticipantsInvited,
    UpdateKind::WebAppData,
];

impl UpdateKind {
    /// All known kinds, in declaration order.
    pub const ALL: &'static [UpdateKind] = &[
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::CallbackQuery,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
        Self::Poll,
        Self::PollAnswer,
        Self::MyChatMember,
        Self::ChatMember,
        Self::ChatJoinRequest,
        Self::NewChatMembers,
        Self::LeftChatMember,
        Self::NewChatTitle,
        Self::NewChatPhoto,
        Self::DeleteChatPhoto,
        Self::GroupChatCreated,
        Self::SupergroupChatCreated,
        Self::ChannelChatCreated,
        Self::MigrateToChatId,
        Self::MigrateFromChatId,
        Self::PinnedMessage,
        Self::Invoice,
        Self::SuccessfulPayment,
        Self::MessageAutoDeleteTimerChanged,
        Self::VideoChatScheduled,
        Self::VideoChatStarted,
        Self::VideoChatEnded,
        Self::VideoChatParticipantsInvited,
        Self::WebAppData,
    ];

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::ChatJoinRequest => "chat_join_request",
            Self::NewChatMembers => "new_chat_members",
            Self::LeftChatMember => "left_chat_member",
            Self::NewChatTitle => "new_chat_title",
            Self::NewChatPhoto => "new_chat_photo",
            Self::DeleteChatPhoto => "delete_chat_photo",
            Self::GroupChatCreated => "group_chat_created",
            Self::SupergroupChatCreated => "supergroup_chat_created",
            Self::ChannelChatCreated => "channel_chat_created",
            Self::MigrateToChatId => "migrate_to_chat_id",
            Self::MigrateFromChatId => "migrate_from_chat_id",
            Self::PinnedMessage => "pinned_message",
            Self::Invoice => "invoice",
            Self::SuccessfulPayment => "successful_payment",
            Self::MessageAutoDeleteTimerChanged => "message_auto_delete_timer_changed",
            Self::VideoChatScheduled => "video_chat_scheduled",
            Self::VideoChatStarted => "video_chat_started",
            Self::VideoChatEnded => "video_chat_ended",
            Self::VideoChatParticipantsInvited => "video_chat_participants_invited",
            Self::WebAppData => "web_app_data",
        }
    }

    /// Returns `true` for kinds resolved from a `message` payload.
    pub fn is_service_event(&self) -> bool {
        SERVICE_EVENTS.contains(self)
    }

    /// Returns `true` for kinds whose payload is a message object.
    pub fn carries_message(&self) -> bool {
        matches!(
            self,
            Self::Message | Self::EditedMessage | Self::ChannelPost | Self::EditedChannelPost
        ) || self.is_service_event()
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tag names no known [`UpdateKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown update kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for UpdateKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in UpdateKind::ALL {
            assert_eq!(kind.as_str().parse::<UpdateKind>(), Ok(*kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::from(kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = "message_reaction".parse::<UpdateKind>().unwrap_err();
        assert_eq!(err, UnknownKind("message_reaction".into()));
        assert_eq!(err.to_string(), "unknown update kind: message_reaction");
    }

    #[test]
    fn test_service_event_table_precedence() {
        let pos = |kind| SERVICE_EVENTS.iter().position(|k| *k == kind).unwrap();
        assert!(pos(UpdateKind::NewChatMembers) < pos(UpdateKind::PinnedMessage));
        assert!(pos(UpdateKind::MigrateToChatId) < pos(UpdateKind::MigrateFromChatId));
        assert!(!UpdateKind::Message.is_service_event());
        assert!(UpdateKind::Invoice.carries_message());
        assert!(!UpdateKind::CallbackQuery.carries_message());
    }
}
