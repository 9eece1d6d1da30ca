//! `av session show`: session and token status.
//!
//! Read-only: the guard runs with refresh suppressed so that inspecting
//! the session never silently mutates stored tokens.

use async_trait::async_trait;
use avalanche_common::{
    AuthError, Guard, OidcConfig, ProtectedOperation, Token, TokenRequirement, TokenType,
};
use serde_json::{json, Map, Value};

use crate::flags::FeatureSet;
use crate::output::{adaptive_naturaldelta, CliError};
use super::CliSession;

/// Builds the session report from the refresh token the guard injects
/// plus the stored access token.
struct ShowSession<'a> {
    session: &'a CliSession,
    features: &'a FeatureSet,
}

impl ShowSession<'_> {
    fn token_details(&self, token: &Token) -> Value {
        let remaining = token.seconds_until_expiry();
        let mut details = Map::new();
        details.insert(
            "status".to_string(),
            json!(if remaining > 0 { "active" } else { "expired" }),
        );
        details.insert("expires_at_utc".to_string(), json!(token.expires_at.to_rfc3339()));

        if remaining > 0 {
            details.insert(
                "time_until_expiration".to_string(),
                json!(adaptive_naturaldelta(remaining)),
            );
            if self.features.show_token {
                details.insert("token".to_string(), json!(token.encoded));
            }
        }

        Value::Object(details)
    }
}

#[async_trait]
impl ProtectedOperation for ShowSession<'_> {
    type Output = Value;

    async fn execute(&self, refresh: Token) -> Result<Value, AuthError> {
        let access = self.session.load_token(TokenType::Access)?;

        let tokens = json!({
            "access_token": self.token_details(&access),
            "refresh_token": self.token_details(&refresh),
        });

        let session_details = json!({
            "active": !refresh.is_expired(),
            "id": refresh.session_id(),
            "user": access.identity(),
            "tokens": tokens,
        });

        Ok(json!({
            "session": session_details,
            "message": "Session active.",
        }))
    }
}

/// Show the current session without touching stored state.
pub async fn run(config: OidcConfig, features: &FeatureSet) -> Result<Value, CliError> {
    let session = super::session_manager(&config);

    let requirement = TokenRequirement::of(TokenType::Refresh)
        .suppress_refresh()
        .with_failure_message("Session inactive. Log in and retry.");
    let failure_message = requirement.failure_message.clone();

    let guard = Guard::new(&session, requirement);
    guard
        .run(&ShowSession { session: &session, features })
        .await
        .map_err(|err| {
            // The guard clears on its own failures; an operation-level
            // token error (e.g. a missing access cell) must not leave
            // partial session state behind either.
            if err.is_session_fatal() {
                session.clear_all();
            }
            CliError::from_guard(failure_message.as_deref(), err)
        })
}
