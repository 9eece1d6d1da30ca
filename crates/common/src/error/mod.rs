//! Error types used throughout the identity client.

use thiserror::Error;

use crate::auth::store::StoreError;
use crate::auth::token::TokenType;

/// Main error type for authentication and token lifecycle operations.
///
/// Every variant carries a message that is safe to surface to the user
/// verbatim; internal detail (HTTP bodies, keyring chatter) stays in the
/// source chain and is only rendered when verbose errors are enabled.
#[derive(Debug, Error)]
pub enum AuthError {
    /// PKCE verifier/challenge input was malformed.
    #[error("invalid PKCE input: {0}")]
    InvalidPkceInput(String),

    /// The loopback redirect listener could not bind its fixed port.
    /// Usually means another login attempt is still running.
    #[error("could not bind callback listener on port {port}: {source}")]
    ListenerBindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The browser redirect never arrived within the deadline.
    #[error("timed out waiting for the browser redirect")]
    RedirectTimeout,

    /// The user interrupted the login before the redirect arrived.
    #[error("login cancelled")]
    RedirectCancelled,

    /// The token endpoint rejected the authorization-code exchange, or
    /// returned a body missing one of the three expected tokens. The
    /// authorization code is single-use, so the attempt cannot be retried.
    #[error("authorization code exchange failed: {0}")]
    CodeExchangeFailed(String),

    /// A JWT could not be decoded, or its payload lacks a usable `exp`
    /// claim.
    #[error("could not decode {token_type} token: {reason}")]
    TokenDecodeFailed { token_type: TokenType, reason: String },

    /// The secret store holds no entry for the requested token type.
    #[error("no {0} token stored")]
    TokenMissing(TokenType),

    /// A stored token exists but is past its expiry.
    #[error("{0} token is expired")]
    TokenExpired(TokenType),

    /// The refresh-token grant was rejected. The session is dead and must
    /// be re-established with an explicit login.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Secret store access failed.
    #[error("secret store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP transport failure talking to the provider.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// Whether this error implies the stored session is unusable.
    ///
    /// The guard and the login flow clear the whole store before
    /// surfacing any of these; callers can rely on that and must not
    /// retry against stored state.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::TokenMissing(_)
                | Self::TokenExpired(_)
                | Self::TokenDecodeFailed { .. }
                | Self::RefreshFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_user_safe() {
        let err = AuthError::TokenMissing(TokenType::Refresh);
        assert_eq!(err.to_string(), "no refresh token stored");

        let err = AuthError::RedirectTimeout;
        assert_eq!(err.to_string(), "timed out waiting for the browser redirect");
    }

    #[test]
    fn session_fatal_classification() {
        assert!(AuthError::TokenExpired(TokenType::Access).is_session_fatal());
        assert!(AuthError::RefreshFailed("invalid_grant".into()).is_session_fatal());
        assert!(!AuthError::RedirectTimeout.is_session_fatal());
        assert!(!AuthError::RedirectCancelled.is_session_fatal());
    }
}
