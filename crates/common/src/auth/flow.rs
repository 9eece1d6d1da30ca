//! Authorization orchestrator: drives one PKCE login attempt end to end.
//!
//! [`LoginAttempt::begin`] binds the redirect listener and builds the
//! authorization URL; the caller opens the browser and then calls
//! [`LoginAttempt::finish`], which waits for the code with a bounded,
//! cancellable loop, exchanges it at the token endpoint, decodes the token
//! triple, and persists it. On every outcome (code, timeout, or
//! cancellation) the listener is stopped and its task joined before the
//! call returns, so no socket or task outlives the attempt.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::callback::{CallbackServer, CodeHandoff};
use super::client::{OidcClientTrait, OidcConfig};
use super::pkce::PkcePair;
use super::store::TokenStore;
use super::token::{TokenSet, UserIdentity};
use crate::error::AuthError;

/// How one redirect wait resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The browser redirect delivered an authorization code.
    CodeReceived(String),
    /// The deadline elapsed without a redirect.
    TimedOut,
    /// The user interrupted the wait.
    Cancelled,
}

/// Result of a completed login: the identity claims the caller cares about.
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub user: UserIdentity,
}

/// One in-flight authorization attempt.
///
/// Transient coordination state; exists between "listener bound" and "code
/// received or timeout/cancel", and is consumed by [`Self::finish`].
pub struct LoginAttempt {
    config: OidcConfig,
    pkce: PkcePair,
    server: CallbackServer,
    handoff: CodeHandoff,
    authorization_url: String,
}

impl LoginAttempt {
    /// Start an attempt: generate the PKCE pair, bind the listener, and
    /// build the authorization URL.
    ///
    /// The listener is bound before anything is shown to the user so that
    /// a port conflict (another attempt still running) surfaces
    /// immediately.
    ///
    /// # Errors
    /// Returns [`AuthError::ListenerBindFailed`] when the fixed callback
    /// port is already taken.
    pub async fn begin(config: OidcConfig) -> Result<Self, AuthError> {
        let pkce = PkcePair::generate();

        let (server, handoff) =
            CallbackServer::bind(config.callback_port, &config.callback_path).await?;

        let authorization_url = config.build_authorization_url(&pkce);

        info!(port = config.callback_port, "login attempt started");

        Ok(Self { config, pkce, server, handoff, authorization_url })
    }

    /// The URL the user must visit to authenticate.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    /// Open the authorization URL in the default browser.
    ///
    /// Best-effort: a failure is logged, not fatal, since the URL is also
    /// surfaced to the user as text.
    pub fn open_browser(&self) {
        if let Err(err) = open::that(&self.authorization_url) {
            warn!("could not open browser automatically: {err}");
        }
    }

    /// Wait for the redirect, exchange the code, persist the tokens.
    ///
    /// The wait polls in short intervals up to the configured deadline so
    /// an external cancellation is honored within roughly one polling
    /// interval rather than only at deadline expiry.
    ///
    /// # Errors
    /// - [`AuthError::RedirectTimeout`] / [`AuthError::RedirectCancelled`]
    ///   when no code arrives; the store is left untouched.
    /// - [`AuthError::CodeExchangeFailed`] / [`AuthError::TokenDecodeFailed`]
    ///   / [`AuthError::Store`] after a code was received; the store is
    ///   cleared so no partial session survives.
    pub async fn finish<C, S>(
        self,
        client: &C,
        store: &S,
        cancel: &CancellationToken,
    ) -> Result<LoginReport, AuthError>
    where
        C: OidcClientTrait + ?Sized,
        S: TokenStore + ?Sized,
    {
        let Self { config, pkce, mut server, handoff, .. } = self;

        let outcome = wait_for_code(
            handoff,
            config.redirect_deadline,
            config.poll_interval,
            cancel,
        )
        .await;

        // Teardown guarantee: the listener is stopped and joined before
        // any outcome is reported, leaked-socket-free even on cancel.
        server.shutdown().await;

        let code = match outcome {
            LoginOutcome::CodeReceived(code) => code,
            LoginOutcome::TimedOut => return Err(AuthError::RedirectTimeout),
            LoginOutcome::Cancelled => return Err(AuthError::RedirectCancelled),
        };

        match establish_session(client, store, &code, &pkce.verifier).await {
            Ok(report) => {
                info!("login successful");
                Ok(report)
            }
            Err(err) => {
                // The code is single-use; a failed exchange cannot be
                // replayed. Leave no partial session behind.
                if let Err(clear_err) = store.clear_all() {
                    warn!("failed to clear token store after login error: {clear_err}");
                }
                Err(err)
            }
        }
    }
}

/// Exchange the code and persist the resulting token triple.
async fn establish_session<C, S>(
    client: &C,
    store: &S,
    code: &str,
    verifier: &str,
) -> Result<LoginReport, AuthError>
where
    C: OidcClientTrait + ?Sized,
    S: TokenStore + ?Sized,
{
    let response = client.exchange_code(code, verifier).await?;
    let tokens = TokenSet::from_exchange(&response)?;

    for token in tokens.iter() {
        store.save(token)?;
    }

    Ok(LoginReport { user: tokens.identity.identity() })
}

/// Block on the single-slot handoff with deadline and cancellation.
async fn wait_for_code(
    mut handoff: CodeHandoff,
    deadline: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> LoginOutcome {
    let deadline_at = Instant::now() + deadline;

    loop {
        tokio::select! {
            received = &mut handoff => {
                return match received {
                    Ok(code) => LoginOutcome::CodeReceived(code),
                    // Sender dropped without a code: the listener died
                    // under us, which only happens on teardown.
                    Err(_) => LoginOutcome::Cancelled,
                };
            }
            () = cancel.cancelled() => return LoginOutcome::Cancelled,
            () = time::sleep(poll_interval) => {
                if Instant::now() >= deadline_at {
                    return LoginOutcome::TimedOut;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the redirect wait loop; full-flow coverage lives in
    //! the auth integration tests.
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn wait_resolves_with_delivered_code() {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send("abc123".to_string());
        });

        let outcome = wait_for_code(
            rx,
            Duration::from_secs(5),
            Duration::from_millis(10),
            &cancel,
        )
        .await;

        assert_eq!(outcome, LoginOutcome::CodeReceived("abc123".to_string()));
    }

    #[tokio::test]
    async fn wait_times_out_at_deadline() {
        let (_tx, rx) = oneshot::channel::<String>();
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let outcome = wait_for_code(
            rx,
            Duration::from_millis(80),
            Duration::from_millis(10),
            &cancel,
        )
        .await;

        assert_eq!(outcome, LoginOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn wait_honors_cancellation_within_a_polling_interval() {
        let (_tx, rx) = oneshot::channel::<String>();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = wait_for_code(
            rx,
            Duration::from_secs(300),
            Duration::from_millis(50),
            &cancel,
        )
        .await;

        assert_eq!(outcome, LoginOutcome::Cancelled);
        // Cancellation observed promptly, not at deadline expiry.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn dropped_sender_resolves_as_cancelled() {
        let (tx, rx) = oneshot::channel::<String>();
        let cancel = CancellationToken::new();
        drop(tx);

        let outcome = wait_for_code(
            rx,
            Duration::from_secs(1),
            Duration::from_millis(10),
            &cancel,
        )
        .await;

        assert_eq!(outcome, LoginOutcome::Cancelled);
    }
}
