//! `av login`: browser-based PKCE login.

use avalanche_common::{
    AuthError, HttpOidcClient, KeyringTokenStore, LoginAttempt, OidcConfig,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::output::CliError;

/// Run the full authorization-code flow and persist the token triple.
pub async fn run(config: OidcConfig, quiet: bool) -> Result<Value, CliError> {
    let client = HttpOidcClient::new(config.clone());
    let store = KeyringTokenStore::default();

    let attempt = LoginAttempt::begin(config).await.map_err(login_error)?;

    if !quiet {
        eprintln!("Opening authorization URL in browser...");
        eprintln!("If it doesn't open, visit: {}", attempt.authorization_url());
    }
    attempt.open_browser();

    // Ctrl-C cancels the wait; the attempt still tears the listener down
    // before the cancellation outcome is reported.
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling login");
            canceller.cancel();
        }
    });

    let report = attempt.finish(&client, &store, &cancel).await.map_err(login_error)?;

    Ok(json!({
        "user": report.user,
        "message": "Login successful.",
    }))
}

fn login_error(err: AuthError) -> CliError {
    let message = match &err {
        AuthError::ListenerBindFailed { .. } => {
            "Another login attempt appears to be running. Close it and retry."
        }
        AuthError::RedirectTimeout => "Timed out waiting for authorization. Please try again.",
        AuthError::RedirectCancelled => "Login cancelled.",
        _ => "Login failed.",
    };
    CliError::new(message, Some(err))
}
