//! Push-mode delivery capability.
//!
//! Webhook servers do not know about middleware chains. They hand every
//! parsed record to an [`UpdateSink`] and acknowledge the delivery as soon as
//! `accept` returns; the sink is responsible for scheduling dispatch.

use std::sync::Arc;

use serde_json::Value;

/// Receives records delivered by a push transport.
pub trait UpdateSink: Send + Sync {
    /// Takes ownership of one record. Must not wait for its dispatch.
    fn accept(&self, record: Value);

    /// Parses a raw body and accepts the record it holds.
    ///
    /// A body that is not JSON is reported back and nothing is scheduled.
    fn accept_bytes(&self, body: &[u8]) -> serde_json::Result<()> {
        let record = serde_json::from_slice(body)?;
        self.accept(record);
        Ok(())
    }
}

/// Type alias for a shared sink.
pub type BoxedUpdateSink = Arc<dyn UpdateSink>;
