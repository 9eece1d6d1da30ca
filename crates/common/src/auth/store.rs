//! Durable token storage in the platform credential store.
//!
//! One logical cell per token type, keyed by `(service, token_<type>_jwt)`
//! in the platform keychain (macOS Keychain, Windows Credential Manager,
//! Linux Secret Service). Only the opaque encoded JWT is stored; claims
//! and expiry are recomputed on load, never persisted separately, so the
//! stored string can never skew against derived state.

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::token::{Token, TokenType};

/// Credential-store service name under which all token cells live.
pub const DEFAULT_SERVICE: &str = "avalanchecli";

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry exists for the requested key.
    #[error("not found")]
    NotFound,

    /// Credential store access failed.
    #[error("access failed: {0}")]
    AccessFailed(String),
}

/// Abstraction over the per-type token cells.
///
/// Each operation on a single cell is atomic from the client's
/// perspective; no cross-key transaction exists because the three token
/// types are independent cells and partial presence is a tolerated state.
pub trait TokenStore: Send + Sync {
    /// Persist a token's encoded JWT under its type's cell.
    ///
    /// # Errors
    /// Returns [`StoreError::AccessFailed`] if the credential store
    /// rejects the write.
    fn save(&self, token: &Token) -> Result<(), StoreError>;

    /// Load the encoded JWT stored for a token type.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when the cell is empty.
    fn load(&self, token_type: TokenType) -> Result<String, StoreError>;

    /// Remove one token type's cell. Removing an absent cell is a no-op.
    ///
    /// # Errors
    /// Returns [`StoreError::AccessFailed`] on credential store failure.
    fn clear(&self, token_type: TokenType) -> Result<(), StoreError>;

    /// Remove every token cell.
    ///
    /// Partial session state is never left behind: callers invoke this on
    /// any unrecoverable token error, forcing a clean re-login. Every cell
    /// is attempted even when one fails, so a credential-store hiccup on
    /// one type cannot strand the others.
    ///
    /// # Errors
    /// Returns the first [`StoreError::AccessFailed`] encountered, after
    /// the full sweep.
    fn clear_all(&self) -> Result<(), StoreError> {
        let mut first_err = None;
        for token_type in TokenType::ALL {
            if let Err(err) = self.clear(token_type) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Account key for a token type's cell.
#[must_use]
pub(crate) fn account_key(token_type: TokenType) -> String {
    format!("token_{}_jwt", token_type.wire_name())
}

/// [`TokenStore`] backed by the platform credential store.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    /// Create a store rooted at the given service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, token_type: TokenType) -> Result<Entry, StoreError> {
        Entry::new(&self.service, &account_key(token_type))
            .map_err(|e| StoreError::AccessFailed(e.to_string()))
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, token: &Token) -> Result<(), StoreError> {
        debug!(service = %self.service, token_type = %token.token_type, "storing token");

        let entry = self.entry(token.token_type)?;
        entry.set_password(&token.encoded).map_err(|e| {
            StoreError::AccessFailed(format!(
                "failed to store {} token: {e}",
                token.token_type
            ))
        })
    }

    fn load(&self, token_type: TokenType) -> Result<String, StoreError> {
        debug!(service = %self.service, token_type = %token_type, "loading token");

        let entry = self.entry(token_type)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                StoreError::NotFound
            } else {
                StoreError::AccessFailed(format!("failed to load {token_type} token: {e}"))
            }
        })
    }

    fn clear(&self, token_type: TokenType) -> Result<(), StoreError> {
        debug!(service = %self.service, token_type = %token_type, "clearing token");

        let entry = self.entry(token_type)?;
        if let Err(e) = entry.delete_credential() {
            if !matches!(e, keyring::Error::NoEntry) {
                return Err(StoreError::AccessFailed(format!(
                    "failed to clear {token_type} token: {e}"
                )));
            }
        }
        Ok(())
    }
}
