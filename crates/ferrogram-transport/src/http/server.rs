//! Webhook listener.
//!
//! Accepts `POST <path>` requests carrying one update record each, hands the
//! record to an [`UpdateSink`] and answers `200 ok` right away. Dispatch
//! happens after the response is written.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use ferrogram_core::{BoxedUpdateSink, UpdateSink, WebhookServerConfig};

/// Builds a router serving the webhook endpoint at `path`.
///
/// Mount it into an existing axum application, or let [`listen`] serve it.
pub fn webhook_router(path: &str, sink: BoxedUpdateSink) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Router::new()
        .route(&path, post(webhook_handler))
        .with_state(sink)
}

async fn webhook_handler(State(sink): State<Arc<dyn UpdateSink>>, body: Bytes) -> Response {
    trace!(len = body.len(), "Received webhook POST");

    match sink.accept_bytes(&body) {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => {
            warn!(error = %err, "Rejecting webhook body that is not a JSON update");
            (StatusCode::BAD_REQUEST, format!("invalid update body: {err}")).into_response()
        }
    }
}

/// Handle to a running webhook listener.
///
/// Dropping this handle stops the listener.
#[derive(Debug)]
pub struct WebhookListener {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WebhookListener {
    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "Webhook listener task failed");
        }
    }
}

impl Drop for WebhookListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Binds the webhook endpoint described by `config` and serves it in the
/// background.
pub async fn listen(
    config: &WebhookServerConfig,
    sink: BoxedUpdateSink,
) -> std::io::Result<WebhookListener> {
    let router = webhook_router(&config.path, sink);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, path = %config.path, "Webhook listener started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        if let Err(e) = server.await {
            error!(error = %e, "Webhook listener error");
        }
        info!("Webhook listener stopped");
    });

    Ok(WebhookListener {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}
