//! Loopback HTTP listener that captures the authorization-code redirect.
//!
//! The identity provider sends the user's browser back to a fixed local
//! port after authentication. This listener hosts the single callback
//! route, extracts the `code` query parameter, and hands it to the
//! orchestrator through a single-slot channel: exactly one code is
//! delivered, exactly once. Requests on any other path, or without a
//! `code`, are answered 404 and change nothing: probe traffic must never
//! crash the listener or consume the slot.
//!
//! The server runs on its own spawned task so the success response to the
//! browser is never blocked by orchestrator-side shutdown logic. Shutdown
//! is requested from outside the request-handling context (the handler
//! never joins the server it runs inside) and is idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::AuthError;

/// Success page shown in the browser once the code has been captured.
const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Login Complete</title></head>
<body><h1>Authentication successful</h1><p>You can close this window and return to the terminal.</p></body>
</html>"#;

type CodeSlot = Arc<StdMutex<Option<oneshot::Sender<String>>>>;

/// Receiving side of the single-slot code handoff.
pub type CodeHandoff = oneshot::Receiver<String>;

/// Single-use loopback server for one authorization attempt.
///
/// State machine: `Idle -> Listening -> CodeReceived -> ShuttingDown ->
/// Stopped`, with `TimedOut`/`Cancelled` exits driven by the orchestrator.
pub struct CallbackServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the listener on its fixed local port and start serving.
    ///
    /// Returns the server together with the receiving side of the code
    /// handoff. The fixed port makes concurrent login attempts
    /// structurally exclusive: a second attempt fails here immediately
    /// instead of hanging.
    ///
    /// # Errors
    /// Returns [`AuthError::ListenerBindFailed`] when the port is taken.
    pub async fn bind(
        port: u16,
        callback_path: &str,
    ) -> Result<(Self, CodeHandoff), AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| AuthError::ListenerBindFailed { port, source })?;

        debug!(port, path = %callback_path, "callback listener bound");

        let (code_tx, code_rx) = oneshot::channel();
        let slot: CodeSlot = Arc::new(StdMutex::new(Some(code_tx)));

        let app = Router::new().route(
            callback_path,
            get(move |query: Query<HashMap<String, String>>| {
                handle_callback(query, slot.clone())
            }),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("callback listener error: {err}");
            }
        });

        let server = Self { port, shutdown_tx: Some(shutdown_tx), handle: Some(handle) };
        Ok((server, code_rx))
    }

    /// The port this listener is bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the listener and wait for its task to finish.
    ///
    /// Graceful shutdown drains in-flight connections first, so a success
    /// response being written to the browser is flushed before the socket
    /// closes. Calling this on an already-stopped listener is a no-op.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!("callback listener panicked: {err}");
                } else {
                    warn!("callback listener join error: {err}");
                }
            }
        }

        debug!(port = self.port, "callback listener stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    Query(params): Query<HashMap<String, String>>,
    slot: CodeSlot,
) -> Response {
    let Some(code) = params.get("code") else {
        // Probe traffic or a provider error redirect; leave the slot alone.
        debug!("callback request without code parameter ignored");
        return StatusCode::NOT_FOUND.into_response();
    };

    let sender = {
        let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.take()
    };

    match sender {
        Some(tx) => {
            debug!("authorization code received");
            let _ = tx.send(code.clone());
            Html(SUCCESS_PAGE).into_response()
        }
        None => {
            // A code was already delivered for this attempt.
            warn!("duplicate callback ignored");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
