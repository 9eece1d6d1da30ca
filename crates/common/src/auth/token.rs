//! Token model: JWT payload decoding, expiry math, and claim access.
//!
//! A [`Token`] is one JWT-based credential. The payload is decoded for
//! claims and expiry only; the signature is **never** verified locally.
//! This client trusts the token endpoint's TLS channel rather than the
//! token's own signature; there is no JWKS fetch. Claims and expiry are
//! always recomputed from the encoded JWT, both for fresh tokens from the
//! token endpoint and for tokens rehydrated from the secret store, so the
//! stored string is the single source of truth.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The three token roles issued by one successful code exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// OpenID Connect ID token carrying the user's identity claims.
    Identity,
    /// Bearer token for API authentication.
    Access,
    /// Long-lived credential used to obtain new access tokens.
    Refresh,
}

impl TokenType {
    /// All token types, in storage order.
    pub const ALL: [Self; 3] = [Self::Identity, Self::Access, Self::Refresh];

    /// Short wire name used for store keys and JSON output.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Identity => "id",
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// One decoded JWT credential.
///
/// Immutable value type. The store owns the durable copies keyed by
/// [`TokenType`]; callers own any in-memory copy they request.
#[derive(Debug, Clone)]
pub struct Token {
    /// Opaque compact JWT string, exactly as issued.
    pub encoded: String,

    /// Which role this token plays.
    pub token_type: TokenType,

    /// Decoded payload claims. Parsed, not verified.
    pub claims: serde_json::Map<String, serde_json::Value>,

    /// Absolute expiry instant derived from the `exp` claim.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Decode a compact JWT into a token.
    ///
    /// Splits on `.`, base64url-decodes the payload segment, parses it as
    /// a JSON object, and derives the expiry from the mandatory `exp`
    /// claim. A token without a parseable `exp` is invalid and fails
    /// construction.
    ///
    /// # Errors
    /// Returns [`AuthError::TokenDecodeFailed`] for malformed JWTs or a
    /// missing/non-numeric `exp` claim.
    pub fn decode(encoded: &str, token_type: TokenType) -> Result<Self, AuthError> {
        let decode_err = |reason: &str| AuthError::TokenDecodeFailed {
            token_type,
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = encoded.split('.').collect();
        if parts.len() != 3 {
            return Err(decode_err("not a compact JWT (expected 3 segments)"));
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| decode_err(&format!("payload is not base64url: {e}")))?;

        let claims: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&payload_bytes)
                .map_err(|e| decode_err(&format!("payload is not a JSON object: {e}")))?;

        let exp = claims
            .get("exp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| decode_err("missing or non-numeric exp claim"))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| decode_err("exp claim out of range"))?;

        Ok(Self { encoded: encoded.to_string(), token_type, claims, expires_at })
    }

    /// Whether the token is past its expiry instant.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Whether the token expires within `threshold_secs` from now.
    ///
    /// Returns the near-expiry verdict together with the remaining seconds
    /// (negative once expired). Used to refresh proactively before a
    /// protected call instead of reacting to a hard 401.
    #[must_use]
    pub fn is_near_expiry(&self, threshold_secs: i64) -> (bool, i64) {
        let remaining = (self.expires_at - Utc::now()).num_seconds();
        (remaining < threshold_secs, remaining)
    }

    /// Seconds until expiry (negative once expired).
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    /// A string claim from the decoded payload, if present.
    #[must_use]
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(serde_json::Value::as_str)
    }

    /// The `sid` session-id claim, if the provider issued one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.str_claim("sid")
    }

    /// Build the user identity summary from this token's claims.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.str_claim("sub").map(str::to_string),
            username: self.str_claim("preferred_username").map(str::to_string),
            email: self.str_claim("email").map(str::to_string),
            name: self.str_claim("name").map(str::to_string),
        }
    }
}

/// User identity claims relevant to CLI output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Token-endpoint response for the authorization-code grant.
///
/// All three tokens are required; a response missing any of them is a hard
/// failure for the login attempt (the code is single-use).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token-endpoint response for the refresh-token grant.
///
/// Providers may rotate the refresh token or re-issue the identity token
/// on refresh; slots absent from the response keep their stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// The {Identity, Access, Refresh} triple from one successful exchange.
///
/// Not persisted as a unit: each member is stored independently under its
/// own type key, so partial presence in the store is a valid state that
/// read paths tolerate.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub identity: Token,
    pub access: Token,
    pub refresh: Token,
}

impl TokenSet {
    /// Decode all three JWTs from a code-exchange response.
    ///
    /// # Errors
    /// Returns [`AuthError::TokenDecodeFailed`] if any member is malformed.
    pub fn from_exchange(response: &TokenExchangeResponse) -> Result<Self, AuthError> {
        Ok(Self {
            identity: Token::decode(&response.id_token, TokenType::Identity)?,
            access: Token::decode(&response.access_token, TokenType::Access)?,
            refresh: Token::decode(&response.refresh_token, TokenType::Refresh)?,
        })
    }

    /// Iterate the members in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        [&self.identity, &self.access, &self.refresh].into_iter()
    }
}
