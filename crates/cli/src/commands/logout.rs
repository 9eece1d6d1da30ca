//! `av logout`: end the session and clear stored tokens.

use avalanche_common::{Guard, OidcClientTrait, OidcConfig, TokenRequirement, TokenType};
use serde_json::{json, Value};
use tracing::warn;

use crate::output::CliError;

/// Tear the session down locally and, best-effort, at the provider.
pub async fn run(config: OidcConfig) -> Result<Value, CliError> {
    let session = super::session_manager(&config);

    let requirement = TokenRequirement::of(TokenType::Refresh)
        .suppress_refresh()
        .with_failure_message("Please log in via 'av login'.");
    let failure_message = requirement.failure_message.clone();

    let guard = Guard::new(&session, requirement);
    let refresh = guard
        .ensure()
        .await
        .map_err(|err| CliError::from_guard(failure_message.as_deref(), err))?;

    // Provider notification is best-effort: logout must work offline, and
    // the local clear below is the part that actually ends the session
    // for this machine.
    if let Err(err) = session.client().end_session(&refresh.encoded).await {
        warn!("provider end-session call failed: {err}");
    }

    session.clear_all();

    Ok(json!({ "message": "Logout successful." }))
}
