//! Core library for the Avalanche command-line identity client.
//!
//! Implements the OAuth 2.0 Authorization Code flow with PKCE against a
//! Keycloak-style OpenID Connect provider, plus local token lifecycle
//! management: durable storage in the platform credential store, expiry
//! tracking, proactive refresh, and a reusable "require valid token" guard
//! for protected CLI commands.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   LoginAttempt   │  Authorization orchestrator (browser + redirect wait)
//! └────────┬─────────┘
//!          │
//!          ├──► CallbackServer    (loopback redirect listener)
//!          ├──► HttpOidcClient    (code exchange, refresh, end-session)
//!          ├──► PkcePair          (verifier/challenge generation)
//!          │
//! ┌────────┴─────────┐
//! │  SessionManager  │  Token lifecycle + refresh state machine
//! └────────┬─────────┘
//!          │
//!          ├──► TokenStore        (platform credential store, one cell/type)
//!          └──► Guard             (precondition wrapper for protected ops)
//! ```
//!
//! # Security Notes
//!
//! - **PKCE**: prevents authorization-code interception; no client secret.
//! - **No local signature verification**: JWT payloads are decoded for
//!   claims and expiry only. This client trusts the token endpoint's TLS
//!   channel, not the token's own signature (no JWKS fetch).
//! - **Secure storage**: tokens live in the platform credential store
//!   (macOS Keychain, Windows Credential Manager, Linux Secret Service),
//!   never in plaintext files.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
pub mod testing;

pub use auth::callback::CallbackServer;
pub use auth::client::{HttpOidcClient, OidcClientTrait, OidcConfig};
pub use auth::flow::{LoginAttempt, LoginOutcome, LoginReport};
pub use auth::guard::{Guard, ProtectedOperation, TokenRequirement};
pub use auth::pkce::{derive_challenge, generate_verifier, PkcePair};
pub use auth::session::SessionManager;
pub use auth::store::{KeyringTokenStore, StoreError, TokenStore};
pub use auth::token::{Token, TokenSet, TokenType, UserIdentity};
pub use error::AuthError;
