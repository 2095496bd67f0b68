//! Event resolution and context construction.
//!
//! Turning a raw record into a [`Context`] happens in two steps:
//!
//! 1. The [`Resolver`] picks the kind tag of the record. With the default
//!    [`ResolutionStrategy::Positional`] the tag is the **second** key of the
//!    record, the first one being `update_id`. Records must therefore be
//!    parsed with their key order preserved.
//! 2. The [`ContextFactory`] looks the tag up and builds the context. Unknown
//!    tags are not errors: the record is dropped and logged at debug level.
//!
//! A `message` context gets one more pass. If its payload carries one of the
//! [`SERVICE_EVENTS`] fields, a second context of that specific kind is built
//! from the same payload and replaces the first one.
//!
//! ```text
//! {"update_id": 5, "message": {..., "new_chat_members": [...]}}
//!        │              │
//!        │              └── tag "message" ──▶ Context(Message)
//!        │                                          │ service pass
//!        └──────────────────────────────────────────▼
//!                                     Context(NewChatMembers, origin = Message)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::foundation::context::Context;
use crate::foundation::error::{ResolveError, ResolveResult};
use crate::foundation::kind::{SERVICE_EVENTS, UpdateKind};
use crate::integration::transport::BoxedTransport;

/// Name of the identifier field of every record.
pub const UPDATE_ID: &str = "update_id";

/// How the kind tag of a record is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The second key of the record is the tag, whatever it is.
    #[default]
    Positional,
    /// Every key is checked against the known kinds; exactly one must match.
    Strict,
}

// =============================================================================
// ContextFactory
// =============================================================================

/// Builds contexts for resolved kind tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFactory;

impl ContextFactory {
    /// Builds the context for `tag`, or returns `None` if the tag names no
    /// supported kind.
    pub fn create(
        transport: &BoxedTransport,
        update: &Arc<Value>,
        tag: &str,
        payload: &Value,
        update_id: i64,
    ) -> Option<Context> {
        let kind = tag.parse::<UpdateKind>().ok()?;
        Some(Self::build(transport, update, kind, payload, update_id))
    }

    /// Builds the context for a known kind.
    pub fn build(
        transport: &BoxedTransport,
        update: &Arc<Value>,
        kind: UpdateKind,
        payload: &Value,
        update_id: i64,
    ) -> Context {
        Context::new(
            Arc::clone(transport),
            Arc::clone(update),
            kind,
            payload.clone(),
            update_id,
        )
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Maps raw records to contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    strategy: ResolutionStrategy,
}

impl Resolver {
    /// Creates a resolver using `strategy`.
    pub fn new(strategy: ResolutionStrategy) -> Self {
        Self { strategy }
    }

    /// Returns the strategy in use.
    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Resolves `record` into a context.
    ///
    /// Returns `Ok(None)` when the record's kind is not supported.
    pub fn resolve(
        &self,
        transport: &BoxedTransport,
        record: Value,
    ) -> ResolveResult<Option<Context>> {
        let update = Arc::new(record);
        let Value::Object(fields) = update.as_ref() else {
            return Err(ResolveError::not_an_object(&update));
        };

        let update_id = fields
            .get(UPDATE_ID)
            .and_then(Value::as_i64)
            .ok_or(ResolveError::MissingId)?;

        let tag = match self.strategy {
            ResolutionStrategy::Positional => fields
                .keys()
                .nth(1)
                .ok_or(ResolveError::MissingKind { update_id })?,
            ResolutionStrategy::Strict => match strict_tag(fields, update_id)? {
                Some(tag) => tag,
                None => {
                    debug!(update_id, "No known kind field in update, dropping");
                    return Ok(None);
                }
            },
        };
        let payload = &fields[tag.as_str()];

        let Some(context) = ContextFactory::create(transport, &update, tag, payload, update_id)
        else {
            debug!(update_id, kind = %tag, "Unsupported update kind, dropping");
            return Ok(None);
        };

        if context.kind() == UpdateKind::Message
            && let Some(service) = service_event(payload)
        {
            debug!(update_id, kind = %service, "Message resolved to service event");
            let context = ContextFactory::build(transport, &update, service, payload, update_id)
                .with_origin(UpdateKind::Message);
            return Ok(Some(context));
        }

        Ok(Some(context))
    }
}

/// Returns the first service event whose field is set in a message payload.
pub fn service_event(payload: &Value) -> Option<UpdateKind> {
    SERVICE_EVENTS
        .iter()
        .copied()
        .find(|kind| is_set(payload.get(kind.as_str())))
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}

fn strict_tag(fields: &Map<String, Value>, update_id: i64) -> ResolveResult<Option<&String>> {
    let known: Vec<&String> = fields
        .keys()
        .filter(|key| key.as_str() != UPDATE_ID && key.parse::<UpdateKind>().is_ok())
        .collect();

    match known.as_slice() {
        [] => Ok(None),
        [tag] => Ok(Some(tag)),
        _ => Err(ResolveError::Ambiguous {
            update_id,
            kinds: known.into_iter().cloned().collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::context::Targetable;
    use crate::foundation::error::{ApiError, ApiResult};
    use crate::integration::transport::Transport;
    use async_trait::async_trait;
    use serde_json::json;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn call(&self, _method: &str, _params: Value) -> ApiResult<Value> {
            Err(ApiError::Timeout)
        }
    }

    fn transport() -> BoxedTransport {
        Arc::new(NullTransport)
    }

    fn record(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_kind_is_second_key() {
        let resolver = Resolver::default();
        let ctx = resolver
            .resolve(
                &transport(),
                record(r#"{"update_id": 5, "callback_query": {"id": "q", "from": {"id": 1}}}"#),
            )
            .unwrap()
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::CallbackQuery);
        assert_eq!(ctx.update_id(), 5);
        assert!(!ctx.is_service_event());
    }

    #[test]
    fn test_positional_rule_follows_key_order() {
        let resolver = Resolver::default();
        let ctx = resolver
            .resolve(
                &transport(),
                record(r#"{"update_id": 1, "poll": {"id": "p"}, "message": {"text": "x"}}"#),
            )
            .unwrap()
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::Poll);
    }

    #[test]
    fn test_positional_rule_drops_shifted_tags() {
        let resolver = Resolver::default();

        let leading = resolver
            .resolve(
                &transport(),
                record(r#"{"trace": "a", "update_id": 1, "message": {}}"#),
            )
            .unwrap();
        assert!(leading.is_none());

        let reordered = resolver
            .resolve(&transport(), record(r#"{"message": {}, "update_id": 1}"#))
            .unwrap();
        assert!(reordered.is_none());
    }

    #[test]
    fn test_unsupported_kind_is_dropped() {
        let resolver = Resolver::default();
        let resolved = resolver
            .resolve(
                &transport(),
                record(r#"{"update_id": 2, "message_reaction": {"chat": {"id": 1}}}"#),
            )
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_malformed_records() {
        let resolver = Resolver::default();
        assert!(matches!(
            resolver.resolve(&transport(), json!([1, 2])),
            Err(ResolveError::NotAnObject(_))
        ));
        assert!(matches!(
            resolver.resolve(&transport(), json!({ "message": {} })),
            Err(ResolveError::MissingId)
        ));
        assert!(matches!(
            resolver.resolve(&transport(), json!({ "update_id": 3 })),
            Err(ResolveError::MissingKind { update_id: 3 })
        ));
    }

    #[test]
    fn test_service_event_precedence() {
        let resolver = Resolver::default();
        let ctx = resolver
            .resolve(
                &transport(),
                record(
                    r#"{"update_id": 9, "message": {
                        "message_id": 1,
                        "chat": {"id": -1, "type": "group"},
                        "pinned_message": {"message_id": 0},
                        "new_chat_members": [{"id": 4, "first_name": "D"}]
                    }}"#,
                ),
            )
            .unwrap()
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::NewChatMembers);
        assert_eq!(ctx.origin_kind(), Some(UpdateKind::Message));
        assert_eq!(ctx.update_id(), 9);
        assert_eq!(ctx.payload()["message_id"], 1);
        assert!(ctx.is_group());
    }

    #[test]
    fn test_false_service_flag_is_ignored() {
        let payload = json!({ "group_chat_created": false, "new_chat_title": null });
        assert_eq!(service_event(&payload), None);

        let payload = json!({ "group_chat_created": true });
        assert_eq!(service_event(&payload), Some(UpdateKind::GroupChatCreated));
    }

    #[test]
    fn test_only_plain_messages_are_sub_resolved() {
        let resolver = Resolver::default();
        let ctx = resolver
            .resolve(
                &transport(),
                record(r#"{"update_id": 4, "edited_message": {"new_chat_title": "t"}}"#),
            )
            .unwrap()
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::EditedMessage);
    }

    #[test]
    fn test_strict_strategy_scans_keys() {
        let resolver = Resolver::new(ResolutionStrategy::Strict);

        let ctx = resolver
            .resolve(
                &transport(),
                record(r#"{"trace": "abc", "update_id": 6, "inline_query": {"id": "i"}}"#),
            )
            .unwrap()
            .unwrap();
        assert_eq!(ctx.kind(), UpdateKind::InlineQuery);

        let err = resolver
            .resolve(
                &transport(),
                record(r#"{"update_id": 7, "poll": {}, "message": {}}"#),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { update_id: 7, .. }));

        let dropped = resolver
            .resolve(&transport(), record(r#"{"update_id": 8, "unknown": {}}"#))
            .unwrap();
        assert!(dropped.is_none());
    }
}
