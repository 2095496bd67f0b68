//! The transport seam between the dispatch core and the remote Bot API.
//!
//! The core never builds HTTP requests itself. It talks to a [`Transport`],
//! which performs one named remote call and returns its `result` field or an
//! [`ApiError`]. `ferrogram-transport` provides the reqwest implementation;
//! tests provide their own.
//!
//! [`ApiExt`] layers the two typed calls the update pipeline depends on
//! (`getMe` and `getUpdates`) on top of [`Transport::call`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::{ApiError, ApiResult};
use crate::foundation::kind::UpdateKind;
use crate::foundation::model::User;

/// Performs remote Bot API calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Calls `method` with `params` and returns the unwrapped `result`.
    async fn call(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Returns whether a credential token is configured.
    ///
    /// Polling refuses to start without one.
    fn has_token(&self) -> bool {
        true
    }
}

/// Type alias for a shared transport.
pub type BoxedTransport = Arc<dyn Transport>;

/// Parameters of a `getUpdates` long-poll call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<UpdateKind>>,
}

/// Typed calls used by the update pipeline.
#[async_trait]
pub trait ApiExt: Transport {
    /// Fetches the identity of the bot behind the token.
    async fn get_me(&self) -> ApiResult<User> {
        let value = self.call("getMe", Value::Object(Default::default())).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Long-polls for new update records.
    ///
    /// Records are returned untyped so that their key order survives until
    /// resolution.
    async fn get_updates(&self, params: &GetUpdatesParams) -> ApiResult<Vec<Value>> {
        let params = serde_json::to_value(params)?;
        match self.call("getUpdates", params).await? {
            Value::Array(records) => Ok(records),
            other => Err(ApiError::decode(format!(
                "getUpdates returned a non-array result: {other}"
            ))),
        }
    }
}

impl<T: Transport + ?Sized> ApiExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedTransport(Value);

    #[async_trait]
    impl Transport for FixedTransport {
        async fn call(&self, _method: &str, _params: Value) -> ApiResult<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_get_updates_params_skip_unset_fields() {
        let params = GetUpdatesParams {
            offset: Some(7),
            timeout: Some(15),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({ "offset": 7, "timeout": 15 })
        );
    }

    #[tokio::test]
    async fn test_get_me_decodes_user() {
        let transport: BoxedTransport = Arc::new(FixedTransport(
            json!({ "id": 42, "is_bot": true, "first_name": "ferro", "username": "ferro_bot" }),
        ));
        let me = transport.get_me().await.unwrap();
        assert_eq!(me.id, 42);
        assert_eq!(me.username.as_deref(), Some("ferro_bot"));
    }

    #[tokio::test]
    async fn test_get_updates_rejects_non_array() {
        let transport = FixedTransport(json!({ "unexpected": true }));
        let err = transport
            .get_updates(&GetUpdatesParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
