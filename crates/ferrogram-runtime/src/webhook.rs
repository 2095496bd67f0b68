//! Push-mode update receiver.
//!
//! [`Webhook`] acknowledges a delivered record as soon as it is accepted and
//! dispatches it on its own task. It is the [`UpdateSink`] behind the axum
//! listener of `ferrogram-transport`, and a [`tower::Service`] for callers
//! that bring their own server.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::{Ready, ready};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::WebhookError;
use ferrogram_core::{BoxedUpdateSink, UPDATE_ID, UpdateSink};
use ferrogram_framework::Dispatcher;

/// Acknowledgement of one accepted delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookAck {
    /// Identifier of the accepted record, when it carried one.
    pub update_id: Option<i64>,
}

/// Accepts pushed records and schedules their dispatch.
#[derive(Clone)]
pub struct Webhook {
    dispatcher: Arc<Dispatcher>,
}

impl Webhook {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Accepts a parsed record and returns without waiting for its dispatch.
    pub fn accept(&self, record: Value) -> WebhookAck {
        let update_id = record.get(UPDATE_ID).and_then(Value::as_i64);
        trace!(?update_id, "Accepted webhook update");

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatcher.handle_update(record).await;
        });

        WebhookAck { update_id }
    }

    /// Accepts a body a server framework may or may not have parsed.
    pub fn accept_body(&self, body: Option<Value>) -> Result<WebhookAck, WebhookError> {
        body.map(|record| self.accept(record))
            .ok_or(WebhookError::MissingBody)
    }

    /// Parses a raw body and accepts the record it holds.
    ///
    /// Nothing is scheduled when the body is not JSON.
    pub fn accept_bytes(&self, body: &[u8]) -> Result<WebhookAck, WebhookError> {
        if body.is_empty() {
            return Err(WebhookError::MissingBody);
        }
        let record = serde_json::from_slice(body).inspect_err(|err| {
            debug!(error = %err, "Rejected webhook body");
        })?;
        Ok(self.accept(record))
    }

    /// Returns this receiver as a shared sink for push transports.
    pub fn sink(&self) -> BoxedUpdateSink {
        Arc::new(self.clone())
    }
}

impl UpdateSink for Webhook {
    fn accept(&self, record: Value) {
        Webhook::accept(self, record);
    }
}

impl tower::Service<Value> for Webhook {
    type Response = WebhookAck;
    type Error = Infallible;
    type Future = Ready<Result<WebhookAck, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, record: Value) -> Self::Future {
        ready(Ok(Webhook::accept(self, record)))
    }
}

impl std::fmt::Debug for Webhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webhook").finish_non_exhaustive()
    }
}
