//! Token lifecycle manager: load, validate, refresh, clear.
//!
//! [`SessionManager`] owns the secret store and the OIDC client and
//! implements the refresh state machine on top of them. It is the single
//! place where stored JWTs are rehydrated into [`Token`] values and where
//! the full-clear policy lives: any unrecoverable token error removes
//! **all** stored token types, never just the offending one, so no partial
//! session state is ever left for the next invocation to stumble into.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::client::OidcClientTrait;
use super::store::{StoreError, TokenStore};
use super::token::{Token, TokenType};
use crate::error::AuthError;

/// Manages stored tokens and their refresh lifecycle.
pub struct SessionManager<C, S>
where
    C: OidcClientTrait,
    S: TokenStore,
{
    client: Arc<C>,
    store: Arc<S>,
    near_expiry_threshold_secs: i64,
}

impl<C, S> SessionManager<C, S>
where
    C: OidcClientTrait,
    S: TokenStore,
{
    /// Create a manager over the given client and store.
    ///
    /// `near_expiry_threshold_secs` controls proactive refresh: tokens
    /// with less remaining lifetime than this are refreshed before a
    /// protected call instead of failing with a hard 401 later.
    #[must_use]
    pub fn new(client: Arc<C>, store: Arc<S>, near_expiry_threshold_secs: i64) -> Self {
        Self { client, store, near_expiry_threshold_secs }
    }

    /// The OIDC client this manager refreshes through.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The underlying token store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The proactive-refresh threshold in seconds.
    #[must_use]
    pub fn near_expiry_threshold(&self) -> i64 {
        self.near_expiry_threshold_secs
    }

    /// Load and decode the stored token of one type.
    ///
    /// Claims and expiry are recomputed from the stored JWT on every load;
    /// nothing derived is persisted.
    ///
    /// # Errors
    /// [`AuthError::TokenMissing`] when the cell is empty,
    /// [`AuthError::TokenDecodeFailed`] when the stored JWT is corrupt.
    pub fn load_token(&self, token_type: TokenType) -> Result<Token, AuthError> {
        let encoded = match self.store.load(token_type) {
            Ok(encoded) => encoded,
            Err(StoreError::NotFound) => return Err(AuthError::TokenMissing(token_type)),
            Err(err) => return Err(err.into()),
        };

        Token::decode(&encoded, token_type)
    }

    /// Run the refresh-token grant and persist the result.
    ///
    /// Persists every slot present in the endpoint's response: the access
    /// token always, rotated refresh/identity tokens when returned. Slots
    /// the provider omits keep their stored values.
    ///
    /// # Errors
    /// [`AuthError::RefreshFailed`] when no usable refresh token is stored
    /// or the endpoint rejects the grant. The session is dead and must be
    /// re-established by explicit login, never retried here.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = match self.load_token(TokenType::Refresh) {
            Ok(token) => token,
            Err(AuthError::TokenMissing(_)) => {
                return Err(AuthError::RefreshFailed("no refresh token stored".into()))
            }
            Err(AuthError::TokenDecodeFailed { reason, .. }) => {
                return Err(AuthError::RefreshFailed(format!(
                    "stored refresh token is unreadable: {reason}"
                )))
            }
            Err(err) => return Err(err),
        };

        if refresh_token.is_expired() {
            return Err(AuthError::RefreshFailed("refresh token is expired".into()));
        }

        debug!("running refresh-token grant");
        let response = self.client.refresh(&refresh_token.encoded).await?;

        let access = Token::decode(&response.access_token, TokenType::Access)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        self.store.save(&access)?;

        if let Some(rotated) = &response.refresh_token {
            let rotated = Token::decode(rotated, TokenType::Refresh)
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
            self.store.save(&rotated)?;
        }

        if let Some(identity) = &response.id_token {
            let identity = Token::decode(identity, TokenType::Identity)
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
            self.store.save(&identity)?;
        }

        info!("tokens refreshed");
        Ok(())
    }

    /// Remove every stored token type. Best-effort; failures are logged.
    pub fn clear_all(&self) {
        if let Err(err) = self.store.clear_all() {
            warn!("failed to clear token store: {err}");
        } else {
            info!("token store cleared");
        }
    }
}
