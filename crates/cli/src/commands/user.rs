//! `av user show`: display the logged-in user.

use async_trait::async_trait;
use avalanche_common::{
    AuthError, Guard, OidcConfig, ProtectedOperation, Token, TokenRequirement, TokenType,
};
use serde_json::{json, Value};

use crate::output::CliError;

/// Reads the identity claims out of the injected identity token.
struct ShowUser;

#[async_trait]
impl ProtectedOperation for ShowUser {
    type Output = Value;

    async fn execute(&self, token: Token) -> Result<Value, AuthError> {
        Ok(json!({
            "user": token.identity(),
            "message": "User is logged in.",
        }))
    }
}

/// Validate the access token (refreshing if needed) and print the user.
pub async fn run(config: OidcConfig) -> Result<Value, CliError> {
    let session = super::session_manager(&config);

    // Access is the validated credential; the identity token is what the
    // operation actually reads its claims from.
    let requirement = TokenRequirement::of(TokenType::Access)
        .provide(TokenType::Identity)
        .with_failure_message("No user is logged in.");
    let failure_message = requirement.failure_message.clone();

    let guard = Guard::new(&session, requirement);
    guard
        .run(&ShowUser)
        .await
        .map_err(|err| {
            if err.is_session_fatal() {
                session.clear_all();
            }
            CliError::from_guard(failure_message.as_deref(), err)
        })
}
