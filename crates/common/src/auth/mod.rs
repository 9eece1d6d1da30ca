//! OAuth 2.0 + PKCE identity flow and token lifecycle.
//!
//! # Module Organization
//!
//! - **[`pkce`]**: PKCE verifier/challenge generation (RFC 7636)
//! - **[`token`]**: token model (JWT payload decode, expiry, claims)
//! - **[`store`]**: durable token storage in the platform credential store
//! - **[`client`]**: OIDC HTTP client (code exchange, refresh, end-session)
//! - **[`callback`]**: loopback redirect listener with single-slot handoff
//! - **[`flow`]**: login orchestrator (browser, bounded wait, exchange)
//! - **[`session`]**: token lifecycle manager and refresh state machine
//! - **[`guard`]**: "require valid token" precondition for protected ops
//!
//! # Data Flow
//!
//! CLI invocation → [`pkce::PkcePair`] → [`flow::LoginAttempt`] opens the
//! browser and starts the [`callback::CallbackServer`] → listener hands the
//! authorization code back → [`client::HttpOidcClient`] exchanges it →
//! [`token::TokenSet`] decoded and persisted via [`store::TokenStore`] →
//! later commands pass through [`guard::Guard`], which validates or
//! refreshes before the protected operation runs.

pub mod callback;
pub mod client;
pub mod flow;
pub mod guard;
pub mod pkce;
pub mod session;
pub mod store;
pub mod token;

pub use callback::CallbackServer;
pub use client::{HttpOidcClient, OidcClientTrait, OidcConfig};
pub use flow::{LoginAttempt, LoginOutcome, LoginReport};
pub use guard::{Guard, ProtectedOperation, TokenRequirement};
pub use pkce::{derive_challenge, generate_verifier, PkcePair};
pub use session::SessionManager;
pub use store::{KeyringTokenStore, StoreError, TokenStore};
pub use token::{Token, TokenSet, TokenType, UserIdentity};
