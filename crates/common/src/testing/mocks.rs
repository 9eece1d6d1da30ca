//! Mock implementations of the auth seams.
//!
//! [`MemoryTokenStore`] swaps the platform credential store for a
//! HashMap behind a mutex; [`MockOidcClient`] scripts provider responses
//! and records call counts so tests can assert on refresh behaviour.

#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::client::OidcClientTrait;
use crate::auth::store::{StoreError, TokenStore};
use crate::auth::token::{RefreshResponse, Token, TokenExchangeResponse, TokenType};
use crate::error::AuthError;

/// In-memory [`TokenStore`], safe for concurrent use in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    cells: Mutex<HashMap<TokenType, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cells(&self) -> std::sync::MutexGuard<'_, HashMap<TokenType, String>> {
        self.cells.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &Token) -> Result<(), StoreError> {
        self.cells().insert(token.token_type, token.encoded.clone());
        Ok(())
    }

    fn load(&self, token_type: TokenType) -> Result<String, StoreError> {
        self.cells().get(&token_type).cloned().ok_or(StoreError::NotFound)
    }

    fn clear(&self, token_type: TokenType) -> Result<(), StoreError> {
        self.cells().remove(&token_type);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockOidcState {
    exchange_response: Mutex<Option<TokenExchangeResponse>>,
    refresh_response: Mutex<Option<RefreshResponse>>,
    fail_exchange: AtomicBool,
    fail_refresh: AtomicBool,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    end_session_calls: AtomicUsize,
}

/// Scriptable [`OidcClientTrait`] double.
///
/// Clones share state, so a test can keep a handle for assertions while
/// the session manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MockOidcClient {
    state: Arc<MockOidcState>,
}

impl MockOidcClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for the next code exchanges.
    pub fn set_exchange_response(&self, response: TokenExchangeResponse) {
        *self.state.exchange_response.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(response);
    }

    /// Script the response for the next refresh calls.
    pub fn set_refresh_response(&self, response: RefreshResponse) {
        *self.state.refresh_response.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(response);
    }

    /// Make every code exchange fail.
    pub fn fail_exchange(&self) {
        self.state.fail_exchange.store(true, Ordering::SeqCst);
    }

    /// Make every refresh call fail.
    pub fn fail_refresh(&self) {
        self.state.fail_refresh.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.state.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn was_refresh_called(&self) -> bool {
        self.refresh_calls() > 0
    }

    #[must_use]
    pub fn end_session_calls(&self) -> usize {
        self.state.end_session_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OidcClientTrait for MockOidcClient {
    async fn exchange_code(
        &self,
        _code: &str,
        _verifier: &str,
    ) -> Result<TokenExchangeResponse, AuthError> {
        self.state.exchange_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_exchange.load(Ordering::SeqCst) {
            return Err(AuthError::CodeExchangeFailed("mock exchange rejection".into()));
        }

        self.state
            .exchange_response
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AuthError::CodeExchangeFailed("no scripted exchange response".into()))
    }

    async fn refresh(&self, _refresh_jwt: &str) -> Result<RefreshResponse, AuthError> {
        self.state.refresh_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::RefreshFailed("mock grant rejection".into()));
        }

        self.state
            .refresh_response
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("no scripted refresh response".into()))
    }

    async fn end_session(&self, _refresh_jwt: &str) -> Result<(), AuthError> {
        self.state.end_session_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
