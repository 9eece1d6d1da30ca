//! Session guard: the precondition wrapper every protected command
//! passes through.
//!
//! A [`Guard`] composes a [`TokenRequirement`] around a
//! [`ProtectedOperation`]: before the operation runs, the required token
//! is loaded, recovered via refresh if absent, proactively refreshed when
//! near expiry, and finally validated. The guard is a hard gate, not a
//! warning. On failure it clears every stored token and returns the
//! error for the CLI to turn into a structured message and a non-zero
//! exit.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::client::OidcClientTrait;
use super::session::SessionManager;
use super::store::TokenStore;
use super::token::{Token, TokenType};
use crate::error::AuthError;

/// What a protected operation demands from the session.
#[derive(Debug, Clone)]
pub struct TokenRequirement {
    /// Token type that must be present and valid. Defaults to Access.
    pub required: TokenType,

    /// Suppress auto-refresh. Read-only status operations must not
    /// silently mutate stored tokens.
    pub suppress_refresh: bool,

    /// Optionally hand a different token type to the wrapped operation
    /// than the one that was validated.
    pub provide: Option<TokenType>,

    /// User-facing message override for guard failures.
    pub failure_message: Option<String>,
}

impl Default for TokenRequirement {
    fn default() -> Self {
        Self {
            required: TokenType::Access,
            suppress_refresh: false,
            provide: None,
            failure_message: None,
        }
    }
}

impl TokenRequirement {
    /// Require a specific token type.
    #[must_use]
    pub fn of(required: TokenType) -> Self {
        Self { required, ..Self::default() }
    }

    /// Disable auto-refresh for this requirement.
    #[must_use]
    pub fn suppress_refresh(mut self) -> Self {
        self.suppress_refresh = true;
        self
    }

    /// Hand the operation a different token type than the validated one.
    #[must_use]
    pub fn provide(mut self, token_type: TokenType) -> Self {
        self.provide = Some(token_type);
        self
    }

    /// Override the user-facing failure message.
    #[must_use]
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }
}

/// An operation that runs only with an authenticated token.
#[async_trait]
pub trait ProtectedOperation: Send + Sync {
    type Output: Send;

    /// Execute with a validated token injected by the guard.
    async fn execute(&self, token: Token) -> Result<Self::Output, AuthError>;
}

/// Precondition wrapper around a [`SessionManager`].
pub struct Guard<'a, C, S>
where
    C: OidcClientTrait,
    S: TokenStore,
{
    session: &'a SessionManager<C, S>,
    requirement: TokenRequirement,
}

impl<'a, C, S> Guard<'a, C, S>
where
    C: OidcClientTrait,
    S: TokenStore,
{
    /// Compose a guard from a session manager and a requirement.
    #[must_use]
    pub fn new(session: &'a SessionManager<C, S>, requirement: TokenRequirement) -> Self {
        Self { session, requirement }
    }

    /// The requirement this guard enforces.
    #[must_use]
    pub fn requirement(&self) -> &TokenRequirement {
        &self.requirement
    }

    /// Validate (or establish) the required token and return the one the
    /// operation should receive.
    ///
    /// Algorithm: load the required type; if missing and recoverable,
    /// derive it via a live refresh token; if near expiry and refresh is
    /// not suppressed, refresh proactively; fail if the token is still
    /// missing or expired. Any failure clears the whole store first.
    ///
    /// # Errors
    /// [`AuthError::TokenMissing`], [`AuthError::TokenExpired`],
    /// [`AuthError::RefreshFailed`], or a store/decode error; in every
    /// case the store has been cleared before the error is returned.
    pub async fn ensure(&self) -> Result<Token, AuthError> {
        match self.ensure_inner().await {
            Ok(token) => Ok(token),
            Err(err) => {
                warn!("session guard failed: {err}");
                self.session.clear_all();
                Err(err)
            }
        }
    }

    /// Run a protected operation behind this guard.
    ///
    /// # Errors
    /// Guard failures as for [`Self::ensure`], plus whatever the
    /// operation itself returns.
    pub async fn run<O>(&self, operation: &O) -> Result<O::Output, AuthError>
    where
        O: ProtectedOperation,
    {
        let token = self.ensure().await?;
        operation.execute(token).await
    }

    async fn ensure_inner(&self) -> Result<Token, AuthError> {
        let req = &self.requirement;
        let recoverable = req.required != TokenType::Refresh && !req.suppress_refresh;

        let mut token = match self.session.load_token(req.required) {
            Ok(token) => token,
            Err(AuthError::TokenMissing(_)) if recoverable => {
                debug!(required = %req.required, "token missing, recovering via refresh");
                self.recover_via_refresh().await?;
                self.session.load_token(req.required)?
            }
            Err(err) => return Err(err),
        };

        if !req.suppress_refresh {
            let (near, remaining) =
                token.is_near_expiry(self.session.near_expiry_threshold());
            if near {
                debug!(
                    required = %req.required,
                    remaining,
                    "token near expiry, refreshing proactively"
                );
                self.session.refresh().await?;
                token = self.session.load_token(req.required)?;
            }
        }

        if token.is_expired() {
            return Err(AuthError::TokenExpired(req.required));
        }

        match req.provide {
            Some(provide) if provide != req.required => self.session.load_token(provide),
            _ => Ok(token),
        }
    }

    /// Establish the required token from a live refresh token.
    async fn recover_via_refresh(&self) -> Result<(), AuthError> {
        let refresh = self.session.load_token(TokenType::Refresh)?;
        if refresh.is_expired() {
            return Err(AuthError::TokenExpired(TokenType::Refresh));
        }
        self.session.refresh().await
    }
}
